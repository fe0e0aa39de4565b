//! Storefront validation rule sets and the routes they are bound to.

use axum::http::Method;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use super::validator::{Constraint, FieldRule, ValidationRuleSet, validate_into};
use crate::domain::entities::FieldError;
use crate::domain::request_context::RequestInput;

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\p{L} .'-]+$").unwrap());
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[6-9]\d{9}$").unwrap());
static PINCODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-9]\d{5}$").unwrap());
static COUPON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9]{3,20}$").unwrap());
static RAZORPAY_ORDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^order_[A-Za-z0-9]+$").unwrap());
static RAZORPAY_PAYMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pay_[A-Za-z0-9]+$").unwrap());
static HEX_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-f0-9]{64}$").unwrap());
static RESET_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-f0-9]{40,128}$").unwrap());

const PASSWORD_MESSAGE: &str = "Password must be 8-128 characters and contain at least one \
uppercase letter, one lowercase letter, one number and one special character";

pub const PAYMENT_METHODS: &[&str] = &["cod", "card", "upi", "netbanking"];
pub const SORT_ORDERS: &[&str] = &["price_asc", "price_desc", "newest", "rating", "popularity"];

static PASSWORD_CLASSES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [r"[a-z]", r"[A-Z]", r"\d", r"[^A-Za-z0-9]"].map(|re| Regex::new(re).unwrap())
});

/// Strong-password rule: length plus one character class per check.
fn strong_password(path: &str) -> FieldRule {
    let [lower, upper, digit, special] = PASSWORD_CLASSES.clone();

    FieldRule::body(path)
        .required("Password is required")
        .sensitive()
        .check(Constraint::String, PASSWORD_MESSAGE)
        .check(Constraint::Length { min: 8, max: 128 }, PASSWORD_MESSAGE)
        .check(Constraint::Pattern(lower), PASSWORD_MESSAGE)
        .check(Constraint::Pattern(upper), PASSWORD_MESSAGE)
        .check(Constraint::Pattern(digit), PASSWORD_MESSAGE)
        .check(Constraint::Pattern(special), PASSWORD_MESSAGE)
}

fn email(path: &str) -> FieldRule {
    FieldRule::body(path)
        .required("Email is required")
        .check(Constraint::Email, "Please provide a valid email address")
        .check(
            Constraint::Length { min: 3, max: 254 },
            "Email must not exceed 254 characters",
        )
}

fn object_id(rule: FieldRule, message: &str) -> FieldRule {
    rule.check(Constraint::ObjectId, message)
}

fn text(path: &str, min: usize, max: usize, label: &str) -> FieldRule {
    FieldRule::body(path)
        .check(Constraint::String, format!("{label} must be text"))
        .check(
            Constraint::Length { min, max },
            format!("{label} must be between {min} and {max} characters"),
        )
}

fn phone(rule: FieldRule) -> FieldRule {
    rule.check(
        Constraint::Pattern(PHONE.clone()),
        "Please provide a valid 10-digit mobile number",
    )
}

fn register() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "register",
        vec![
            text("name", 2, 50, "Name")
                .required("Name is required")
                .check(
                    Constraint::Pattern(NAME.clone()),
                    "Name can only contain letters, spaces, dots, apostrophes and hyphens",
                ),
            email("email"),
            strong_password("password"),
            phone(FieldRule::body("phone").optional()),
        ],
    )
}

fn login() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "login",
        vec![
            email("email"),
            FieldRule::body("password")
                .required("Password is required")
                .sensitive()
                .check(Constraint::String, "Password is required")
                .check(Constraint::Length { min: 1, max: 128 }, "Invalid password"),
        ],
    )
}

fn forgot_password() -> ValidationRuleSet {
    ValidationRuleSet::new("forgot_password", vec![email("email")])
}

fn reset_password() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "reset_password",
        vec![
            FieldRule::body("token")
                .required("Reset token is required")
                .sensitive()
                .check(Constraint::Pattern(RESET_TOKEN.clone()), "Invalid reset token"),
            strong_password("password"),
            FieldRule::body("confirmPassword")
                .required("Please confirm your password")
                .sensitive()
                .check(Constraint::EqualsField("password"), "Passwords do not match"),
        ],
    )
}

fn address() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "address",
        vec![
            text("fullName", 2, 100, "Full name").required("Full name is required"),
            phone(FieldRule::body("phone").required("Phone number is required")),
            text("addressLine1", 5, 200, "Address line 1").required("Address is required"),
            text("addressLine2", 0, 200, "Address line 2"),
            text("landmark", 0, 100, "Landmark"),
            text("city", 2, 50, "City").required("City is required"),
            text("state", 2, 50, "State").required("State is required"),
            FieldRule::body("pincode")
                .required("Pincode is required")
                .check(
                    Constraint::Pattern(PINCODE.clone()),
                    "Please provide a valid 6-digit pincode",
                ),
            FieldRule::body("isDefault")
                .optional()
                .check(Constraint::Boolean, "isDefault must be a boolean"),
        ],
    )
}

fn create_order() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "create_order",
        vec![
            FieldRule::body("items")
                .required("Order must contain at least one item")
                .check(
                    Constraint::Array { min: 1, max: 50 },
                    "Order must contain between 1 and 50 items",
                ),
            object_id(
                FieldRule::body("items[].productId").required("Product ID is required"),
                "Invalid product ID",
            ),
            FieldRule::body("items[].quantity")
                .required("Quantity is required")
                .check(
                    Constraint::Integer { min: 1, max: 10 },
                    "Quantity must be between 1 and 10",
                ),
            object_id(
                FieldRule::body("addressId").required("Shipping address is required"),
                "Invalid address ID",
            ),
            FieldRule::body("paymentMethod")
                .required("Payment method is required")
                .check(Constraint::OneOf(PAYMENT_METHODS), "Invalid payment method"),
            FieldRule::body("couponCode")
                .optional()
                .check(Constraint::Pattern(COUPON.clone()), "Invalid coupon code"),
            text("notes", 0, 500, "Notes"),
        ],
    )
}

fn verify_payment() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "verify_payment",
        vec![
            FieldRule::body("razorpay_order_id")
                .required("Payment order ID is required")
                .check(
                    Constraint::Pattern(RAZORPAY_ORDER.clone()),
                    "Invalid payment order ID",
                ),
            FieldRule::body("razorpay_payment_id")
                .required("Payment ID is required")
                .check(Constraint::Pattern(RAZORPAY_PAYMENT.clone()), "Invalid payment ID"),
            FieldRule::body("razorpay_signature")
                .required("Payment signature is required")
                .check(
                    Constraint::Pattern(HEX_SIGNATURE.clone()),
                    "Invalid payment signature",
                ),
            object_id(
                FieldRule::body("orderId").required("Order ID is required"),
                "Invalid order ID",
            ),
        ],
    )
}

fn product() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "product",
        vec![
            text("name", 2, 200, "Product name").required("Product name is required"),
            text("description", 10, 5000, "Description").required("Description is required"),
            FieldRule::body("price")
                .required("Price is required")
                .check(
                    Constraint::Number {
                        min: 0.01,
                        max: 10_000_000.0,
                    },
                    "Price must be a positive number",
                ),
            FieldRule::body("discountPrice")
                .optional()
                .check(
                    Constraint::Number {
                        min: 0.0,
                        max: 10_000_000.0,
                    },
                    "Discount price must be a non-negative number",
                ),
            object_id(
                FieldRule::body("category").required("Category is required"),
                "Invalid category ID",
            ),
            FieldRule::body("stock")
                .required("Stock is required")
                .check(
                    Constraint::Integer {
                        min: 0,
                        max: 1_000_000,
                    },
                    "Stock must be a non-negative integer",
                ),
            FieldRule::body("images")
                .optional()
                .check(Constraint::Array { min: 0, max: 10 }, "At most 10 images allowed"),
            FieldRule::body("images[]")
                .required("Image URL is required")
                .check(Constraint::Url, "Invalid image URL"),
            FieldRule::body("tags")
                .optional()
                .check(Constraint::Array { min: 0, max: 20 }, "At most 20 tags allowed"),
            FieldRule::body("tags[]")
                .required("Tag must not be empty")
                .check(Constraint::Length { min: 1, max: 30 }, "Tags must be 1-30 characters"),
            FieldRule::body("isActive")
                .optional()
                .check(Constraint::Boolean, "isActive must be a boolean"),
        ],
    )
}

fn review() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "review",
        vec![
            FieldRule::body("rating")
                .required("Rating is required")
                .check(
                    Constraint::Integer { min: 1, max: 5 },
                    "Rating must be between 1 and 5",
                ),
            text("title", 0, 100, "Title"),
            text("comment", 10, 1000, "Comment").required("Comment is required"),
        ],
    )
}

fn cart_item() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "cart_item",
        vec![
            object_id(
                FieldRule::body("productId").required("Product ID is required"),
                "Invalid product ID",
            ),
            FieldRule::body("quantity")
                .required("Quantity is required")
                .check(
                    Constraint::Integer { min: 1, max: 10 },
                    "Quantity must be between 1 and 10",
                ),
        ],
    )
}

fn search() -> ValidationRuleSet {
    let price = |path: &str| {
        FieldRule::query(path).optional().check(
            Constraint::Number {
                min: 0.0,
                max: 10_000_000.0,
            },
            "Price filter must be a non-negative number",
        )
    };

    ValidationRuleSet::new(
        "search",
        vec![
            FieldRule::query("q").optional().check(
                Constraint::Length { min: 1, max: 100 },
                "Search query must be between 1 and 100 characters",
            ),
            object_id(FieldRule::query("category").optional(), "Invalid category ID"),
            price("minPrice"),
            price("maxPrice"),
            FieldRule::query("sort")
                .optional()
                .check(Constraint::OneOf(SORT_ORDERS), "Invalid sort option"),
            FieldRule::query("page").optional().check(
                Constraint::Integer { min: 1, max: 1000 },
                "Page must be between 1 and 1000",
            ),
            FieldRule::query("limit").optional().check(
                Constraint::Integer { min: 1, max: 100 },
                "Limit must be between 1 and 100",
            ),
        ],
    )
}

fn object_id_param() -> ValidationRuleSet {
    ValidationRuleSet::new(
        "object_id_param",
        vec![object_id(
            FieldRule::param("id").required("ID is required"),
            "Invalid ID format",
        )],
    )
}

/// Binds a method and path pattern to the rule sets that validate it.
///
/// Pattern segments written as `{name}` match any single segment and are captured
/// into the request params.
#[derive(Debug, Clone)]
pub struct RouteBinding {
    pub method: Method,
    pub pattern: &'static str,
    pub rule_sets: &'static [&'static str],
}

impl RouteBinding {
    fn new(method: Method, pattern: &'static str, rule_sets: &'static [&'static str]) -> Self {
        Self {
            method,
            pattern,
            rule_sets,
        }
    }

    /// Captured params if `method` and `path` match this binding.
    pub fn capture(&self, method: &Method, path: &str) -> Option<Map<String, Value>> {
        if &self.method != method {
            return None;
        }

        let mut pattern = self.pattern.split('/');
        let mut actual = path.trim_end_matches('/').split('/');
        let mut params = Map::new();
        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return Some(params),
                (Some(p), Some(a)) => {
                    if let Some(name) = p.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                        if a.is_empty() {
                            return None;
                        }
                        params.insert(name.to_string(), Value::String(a.to_string()));
                    } else if p != a {
                        return None;
                    }
                }
                _ => return None,
            }
        }
    }
}

/// A route resolved to its rule sets.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub rule_sets: &'static [&'static str],
    pub params: Map<String, Value>,
}

/// Raised when a binding or caller names a rule set that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown validation rule set: {0}")]
pub struct UnknownRuleSet(pub String);

/// All named rule sets plus the route table.
pub struct RuleCatalog {
    sets: HashMap<&'static str, ValidationRuleSet>,
    bindings: Vec<RouteBinding>,
}

impl RuleCatalog {
    pub fn new(sets: Vec<ValidationRuleSet>, bindings: Vec<RouteBinding>) -> Self {
        Self {
            sets: sets.into_iter().map(|s| (s.name(), s)).collect(),
            bindings,
        }
    }

    /// The storefront rule sets and routes.
    pub fn storefront() -> Self {
        Self::new(
            vec![
                register(),
                login(),
                forgot_password(),
                reset_password(),
                address(),
                create_order(),
                verify_payment(),
                product(),
                review(),
                cart_item(),
                search(),
                object_id_param(),
            ],
            storefront_routes(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&ValidationRuleSet> {
        self.sets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sets.keys().copied()
    }

    pub fn bindings(&self) -> &[RouteBinding] {
        &self.bindings
    }

    /// First binding matching the request, in table order.
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.bindings.iter().find_map(|binding| {
            binding.capture(method, path).map(|params| RouteMatch {
                rule_sets: binding.rule_sets,
                params,
            })
        })
    }

    /// Validates `input` against one named rule set.
    pub fn validate(
        &self,
        input: &RequestInput,
        rule_set: &str,
    ) -> Result<Vec<FieldError>, UnknownRuleSet> {
        self.validate_all(input, &[rule_set])
    }

    /// Validates `input` against several rule sets, still at most one error per field.
    pub fn validate_all(
        &self,
        input: &RequestInput,
        rule_sets: &[&str],
    ) -> Result<Vec<FieldError>, UnknownRuleSet> {
        let mut seen = HashSet::new();
        let mut errors = Vec::new();
        for name in rule_sets {
            let set = self
                .get(name)
                .ok_or_else(|| UnknownRuleSet((*name).to_string()))?;
            validate_into(set.rules(), input, &mut seen, &mut errors);
        }
        Ok(errors)
    }
}

fn storefront_routes() -> Vec<RouteBinding> {
    const ID: &[&str] = &["object_id_param"];

    vec![
        RouteBinding::new(Method::POST, "/api/auth/register", &["register"]),
        RouteBinding::new(Method::POST, "/api/auth/login", &["login"]),
        RouteBinding::new(Method::POST, "/api/auth/forgot-password", &["forgot_password"]),
        RouteBinding::new(Method::POST, "/api/auth/reset-password", &["reset_password"]),
        RouteBinding::new(Method::GET, "/api/products/search", &["search"]),
        RouteBinding::new(Method::GET, "/api/search", &["search"]),
        RouteBinding::new(Method::GET, "/api/products", &["search"]),
        RouteBinding::new(Method::GET, "/api/products/{id}", ID),
        RouteBinding::new(
            Method::POST,
            "/api/products/{id}/reviews",
            &["object_id_param", "review"],
        ),
        RouteBinding::new(Method::POST, "/api/cart/items", &["cart_item"]),
        RouteBinding::new(Method::DELETE, "/api/cart/items/{id}", ID),
        RouteBinding::new(Method::POST, "/api/addresses", &["address"]),
        RouteBinding::new(
            Method::PUT,
            "/api/addresses/{id}",
            &["object_id_param", "address"],
        ),
        RouteBinding::new(Method::DELETE, "/api/addresses/{id}", ID),
        RouteBinding::new(Method::POST, "/api/orders", &["create_order"]),
        RouteBinding::new(Method::GET, "/api/orders/{id}", ID),
        RouteBinding::new(Method::POST, "/api/orders/{id}/cancel", ID),
        RouteBinding::new(Method::POST, "/api/payments/verify", &["verify_payment"]),
        RouteBinding::new(Method::POST, "/api/admin/products", &["product"]),
        RouteBinding::new(
            Method::PUT,
            "/api/admin/products/{id}",
            &["object_id_param", "product"],
        ),
        RouteBinding::new(Method::DELETE, "/api/admin/products/{id}", ID),
        RouteBinding::new(Method::GET, "/api/admin/orders/{id}", ID),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PRODUCT_ID: &str = "64b7f0c2a1b2c3d4e5f60718";

    fn body(value: Value) -> RequestInput {
        RequestInput {
            body: value,
            ..RequestInput::default()
        }
    }

    #[test]
    fn test_every_binding_names_a_known_set() {
        let catalog = RuleCatalog::storefront();

        for binding in catalog.bindings() {
            for name in binding.rule_sets {
                assert!(catalog.get(name).is_some(), "{} -> {}", binding.pattern, name);
            }
        }
        assert_eq!(catalog.names().count(), 12);
    }

    #[test]
    fn test_route_captures_params() {
        let catalog = RuleCatalog::storefront();

        let matched = catalog
            .route(&Method::POST, &format!("/api/products/{PRODUCT_ID}/reviews"))
            .unwrap();
        assert_eq!(matched.rule_sets, &["object_id_param", "review"]);
        assert_eq!(matched.params.get("id"), Some(&json!(PRODUCT_ID)));

        let search = catalog.route(&Method::GET, "/api/products/search").unwrap();
        assert_eq!(search.rule_sets, &["search"]);

        assert!(catalog.route(&Method::DELETE, "/api/auth/login").is_none());
        assert!(catalog.route(&Method::GET, "/api/products/a/b").is_none());
    }

    #[test]
    fn test_register_collects_all_errors() {
        let catalog = RuleCatalog::storefront();
        let errors = catalog
            .validate(
                &body(json!({
                    "name": "Asha Rao",
                    "email": "bad-email",
                    "password": "weakpass",
                    "phone": "12345"
                })),
                "register",
            )
            .unwrap();

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "password", "phone"]);
        assert_eq!(errors[1].message, PASSWORD_MESSAGE);
        assert_eq!(errors[1].value, json!("[REDACTED]"));
    }

    #[test]
    fn test_register_accepts_strong_password() {
        let catalog = RuleCatalog::storefront();
        let errors = catalog
            .validate(
                &body(json!({
                    "name": "Asha Rao",
                    "email": "asha@example.com",
                    "password": "Str0ng!pass",
                    "phone": "9876543210"
                })),
                "register",
            )
            .unwrap();

        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_reset_password_confirmation() {
        let catalog = RuleCatalog::storefront();
        let errors = catalog
            .validate(
                &body(json!({
                    "token": "a".repeat(64),
                    "password": "Str0ng!pass",
                    "confirmPassword": "Str0ng!pasS"
                })),
                "reset_password",
            )
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "confirmPassword");
        assert_eq!(errors[0].message, "Passwords do not match");
    }

    #[test]
    fn test_create_order() {
        let catalog = RuleCatalog::storefront();
        let valid = json!({
            "items": [{"productId": PRODUCT_ID, "quantity": 2}],
            "addressId": PRODUCT_ID,
            "paymentMethod": "upi"
        });
        assert!(catalog.validate(&body(valid), "create_order").unwrap().is_empty());

        let errors = catalog
            .validate(
                &body(json!({
                    "items": [{"productId": PRODUCT_ID, "quantity": 11}],
                    "addressId": PRODUCT_ID,
                    "paymentMethod": "bitcoin"
                })),
                "create_order",
            )
            .unwrap();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["items[0].quantity", "paymentMethod"]);
    }

    #[test]
    fn test_combined_sets_with_params() {
        let catalog = RuleCatalog::storefront();
        let input = RequestInput {
            body: json!({"rating": 6, "comment": "Fits well, good fabric"}),
            query: json!({}),
            params: json!({"id": "not-an-id"}),
        };

        let errors = catalog
            .validate_all(&input, &["object_id_param", "review"])
            .unwrap();

        assert_eq!(
            errors,
            vec![
                FieldError::new("id", "Invalid ID format", json!("not-an-id")),
                FieldError::new("rating", "Rating must be between 1 and 5", json!(6)),
            ]
        );
    }

    #[test]
    fn test_search_query() {
        let catalog = RuleCatalog::storefront();
        let query = |q: Value| RequestInput {
            query: q,
            ..RequestInput::default()
        };

        assert!(
            catalog
                .validate(&query(json!({"q": "kurta", "sort": "newest", "page": "2"})), "search")
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            catalog
                .validate(&query(json!({"sort": "random", "limit": "500"})), "search")
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_unknown_rule_set() {
        let catalog = RuleCatalog::storefront();
        assert_eq!(
            catalog.validate(&RequestInput::default(), "checkout"),
            Err(UnknownRuleSet("checkout".to_string()))
        );
    }
}
