//! # Catalog Seeding
//!
//! Loads a sample product catalog and registers it through the payment
//! service. Runs only against an empty catalog.

use pay_core::{CreateProduct, Currency, PaymentResult, PaymentService};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One catalog entry, with a decimal price
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Deserialize)]
struct SampleCatalog {
    #[serde(default)]
    products: Vec<SampleProduct>,
}

/// Result of a seeding run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub failed: usize,
    /// Catalog already had products; nothing was attempted
    pub skipped: bool,
}

/// Built-in course catalog used when no file is given
pub fn default_catalog() -> Vec<SampleProduct> {
    let course = |name: &str, description: &str, price: f64| SampleProduct {
        name: name.to_string(),
        description: Some(description.to_string()),
        price,
        currency: Currency::USD,
    };
    vec![
        course("Curso Básico", "Introducción a los fundamentos", 29.99),
        course("Curso Intermedio", "Técnicas y proyectos prácticos", 59.99),
        course("Curso Premium", "Contenido avanzado con mentoría", 99.99),
        course("Pack Completo", "Todos los cursos incluidos", 149.99),
    ]
}

/// Where `seed-products` looks for a catalog when none is given
pub const SAMPLE_CATALOG_PATHS: &[&str] = &[
    "config/sample_products.toml",
    "../config/sample_products.toml",
    "../../config/sample_products.toml",
];

/// First existing catalog file among `candidates`
pub fn find_sample_catalog(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Load a catalog from TOML (`[[products]]` tables), or the built-in one.
pub fn load_sample_catalog(path: Option<&Path>) -> anyhow::Result<Vec<SampleProduct>> {
    let Some(path) = path else {
        return Ok(default_catalog());
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let catalog: SampleCatalog = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
    info!("Loaded {} products from {}", catalog.products.len(), path.display());
    Ok(catalog.products)
}

/// Create each sample product unless the catalog already has entries.
///
/// A failed item is logged and skipped; the rest are still attempted.
pub async fn seed_products(
    service: &PaymentService,
    samples: &[SampleProduct],
) -> PaymentResult<SeedReport> {
    let existing = service.product_count().await?;
    if existing > 0 {
        info!("Catalog already has {} products, skipping seed", existing);
        return Ok(SeedReport {
            skipped: true,
            ..SeedReport::default()
        });
    }

    let mut report = SeedReport::default();
    for sample in samples {
        let request = CreateProduct {
            name: sample.name.clone(),
            description: sample.description.clone(),
            price: sample.price,
            currency: sample.currency,
        };
        match service.create_product(request).await {
            Ok(product) => {
                info!(product_id = product.id, "Seeded product {}", product.name);
                report.created += 1;
            }
            Err(e) => {
                warn!("Failed to seed product {}: {}", sample.name, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = load_sample_catalog(None).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog[3].name, "Pack Completo");
        assert!(catalog.iter().all(|p| p.currency == Currency::USD));
    }

    #[test]
    fn test_parse_catalog_file() {
        let path = std::env::temp_dir().join(format!("sample_catalog_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[[products]]
name = "Taller"
price = 15.5

[[products]]
name = "Mentoría"
description = "Una hora"
price = 40.0
currency = "mxn"
"#,
        )
        .unwrap();

        let catalog = load_sample_catalog(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].currency, Currency::USD);
        assert_eq!(catalog[1].currency, Currency::MXN);
        assert_eq!(catalog[1].description.as_deref(), Some("Una hora"));
    }

    #[test]
    fn test_missing_catalog_file_fails() {
        assert!(load_sample_catalog(Some(Path::new("/nonexistent/catalog.toml"))).is_err());
    }

    #[test]
    fn test_find_sample_catalog() {
        let path = std::env::temp_dir().join(format!("found_catalog_{}.toml", std::process::id()));
        std::fs::write(&path, "products = []\n").unwrap();
        let existing = path.to_string_lossy().to_string();

        let found = find_sample_catalog(&["/nonexistent/catalog.toml", &existing]);
        std::fs::remove_file(&path).ok();

        assert_eq!(found, Some(path));
        assert_eq!(find_sample_catalog(&["/nonexistent/catalog.toml"]), None);
    }

    mod seeding {
        use super::*;
        use async_trait::async_trait;
        use pay_core::{
            CatalogProduct, CatalogProductRequest, CustomerRequest, InMemoryStore, NewProduct,
            PaymentError, PaymentGateway, PaymentIntent, PaymentIntentRequest, ProductStore,
            WebhookEvent,
        };
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        /// Catalog-only gateway that refuses products named "Roto".
        #[derive(Default)]
        struct CatalogGateway {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl PaymentGateway for CatalogGateway {
            async fn create_customer(&self, _request: &CustomerRequest) -> PaymentResult<String> {
                Err(PaymentError::Configuration("not used".into()))
            }

            async fn create_payment_intent(
                &self,
                _request: &PaymentIntentRequest,
            ) -> PaymentResult<PaymentIntent> {
                Err(PaymentError::Configuration("not used".into()))
            }

            async fn create_product(
                &self,
                request: &CatalogProductRequest,
            ) -> PaymentResult<CatalogProduct> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if request.name == "Roto" {
                    return Err(PaymentError::ProviderError {
                        provider: "catalog".into(),
                        message: "rejected".into(),
                    });
                }
                Ok(CatalogProduct {
                    product_id: format!("prod_{}", n),
                    price_id: format!("price_{}", n),
                })
            }

            async fn verify_webhook(
                &self,
                _payload: &[u8],
                _signature: &str,
            ) -> PaymentResult<WebhookEvent> {
                Err(PaymentError::WebhookVerificationFailed("not used".into()))
            }

            fn publishable_key(&self) -> &str {
                "pk_test_catalog"
            }

            fn provider_name(&self) -> &'static str {
                "catalog"
            }
        }

        fn sample(name: &str, price: f64) -> SampleProduct {
            SampleProduct {
                name: name.to_string(),
                description: None,
                price,
                currency: Currency::USD,
            }
        }

        fn service() -> (PaymentService, Arc<CatalogGateway>, Arc<InMemoryStore>) {
            let gateway = Arc::new(CatalogGateway::default());
            let store = Arc::new(InMemoryStore::new());
            let service = PaymentService::new(gateway.clone(), store.clone(), store.clone());
            (service, gateway, store)
        }

        #[tokio::test]
        async fn failed_item_is_skipped_and_the_rest_created() {
            let (service, gateway, _) = service();
            let samples = [sample("Uno", 10.0), sample("Roto", 20.0), sample("Tres", 30.0)];

            let report = seed_products(&service, &samples).await.unwrap();

            assert_eq!(
                report,
                SeedReport {
                    created: 2,
                    failed: 1,
                    skipped: false
                }
            );
            assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
            let names: Vec<_> = service
                .list_products()
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.name)
                .collect();
            assert_eq!(names, ["Uno", "Tres"]);
        }

        #[tokio::test]
        async fn non_empty_catalog_is_left_alone() {
            let (service, gateway, store) = service();
            ProductStore::insert(
                store.as_ref(),
                NewProduct {
                    name: "Existente".into(),
                    description: None,
                    price: 500,
                    currency: Currency::USD,
                    stripe_product_id: None,
                    stripe_price_id: None,
                },
            )
            .await
            .unwrap();

            let report = seed_products(&service, &default_catalog()).await.unwrap();

            assert!(report.skipped);
            assert_eq!(report.created, 0);
            assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
            assert_eq!(service.product_count().await.unwrap(), 1);
        }
    }
}
