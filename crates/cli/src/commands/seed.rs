//! Reference data: subscription plans and global product categories.
//!
//! Rows are matched by name, so running the seed again only adds what is
//! missing and never touches edited rows.

use rust_decimal::Decimal;

use univendor_api::db::categories::{CategoryInput, CategoryRepository};
use univendor_api::db::plans::{PlanInput, PlanRepository};

use super::{CliError, connect};

const GLOBAL_CATEGORIES: &[(&str, &str)] = &[
    ("Electronics", "Phones, computers and accessories"),
    ("Clothing", "Apparel for every season"),
    ("Home & Kitchen", "Furniture, decor and cookware"),
    ("Beauty", "Skincare, makeup and personal care"),
    ("Books", "Print and digital books"),
    ("Sports & Outdoors", "Equipment and activewear"),
];

fn plan(
    name: &str,
    description: &str,
    price: i64,
    features: &[&str],
    limits: (i32, i32, i32),
    support_level: &str,
    is_default: bool,
) -> PlanInput {
    let (products, storage_mb, domains) = limits;
    PlanInput {
        name: name.to_string(),
        description: Some(description.to_string()),
        price: Decimal::new(price, 0),
        yearly_price: Some(Decimal::new(price * 10, 0)),
        currency: "INR".to_string(),
        features: features.iter().map(ToString::to_string).collect(),
        product_limit: Some(products),
        storage_limit: Some(storage_mb),
        custom_domain_limit: Some(domains),
        support_level: Some(support_level.to_string()),
        trial_days: 7,
        is_active: true,
        is_default,
    }
}

fn default_plans() -> Vec<PlanInput> {
    vec![
        plan(
            "Basic",
            "Perfect for small businesses just getting started with e-commerce",
            2999,
            &["Up to 50 products", "5GB storage", "1 custom domain", "Email support"],
            (50, 5_000, 1),
            "basic",
            false,
        ),
        plan(
            "Pro",
            "For growing businesses with expanded inventory needs",
            7999,
            &[
                "Up to 500 products",
                "20GB storage",
                "3 custom domains",
                "Priority support",
                "Advanced analytics",
                "Automated inventory alerts",
            ],
            (500, 20_000, 3),
            "priority",
            true,
        ),
        plan(
            "Business",
            "Enterprise-grade solution for established online retailers",
            14999,
            &[
                "Unlimited products",
                "100GB storage",
                "10 custom domains",
                "Premium support",
                "Advanced analytics",
                "API access",
                "Dedicated account manager",
            ],
            (10_000, 100_000, 10),
            "premium",
            false,
        ),
    ]
}

/// Insert missing default plans and global categories.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    let plans = PlanRepository::new(&pool);
    let existing: Vec<String> = plans.list(false).await?.into_iter().map(|p| p.name).collect();
    let mut created = 0;
    for input in default_plans() {
        if existing.contains(&input.name) {
            continue;
        }
        plans.create(&input).await?;
        created += 1;
    }
    tracing::info!(created, "Subscription plans seeded");

    let categories = CategoryRepository::new(&pool);
    let existing: Vec<String> = categories
        .list_global()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    let mut created = 0;
    for (name, description) in GLOBAL_CATEGORIES {
        if existing.iter().any(|n| n == name) {
            continue;
        }
        let input = CategoryInput {
            name: (*name).to_string(),
            description: Some((*description).to_string()),
            ..CategoryInput::default()
        };
        categories.create(None, &input).await?;
        created += 1;
    }
    tracing::info!(created, "Global categories seeded");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_default_plan() {
        let plans = default_plans();
        assert_eq!(plans.iter().filter(|p| p.is_default).count(), 1);
        assert!(plans.iter().all(|p| p.yearly_price > Some(p.price)));
    }
}
