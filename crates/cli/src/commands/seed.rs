//! Seed the catalog from a YAML file.
//!
//! The file is a list of products:
//!
//! ```yaml
//! - name: Caja de cartón
//!   description: 40x30x30 cm
//!   price: "2.35"
//!   stock: 500
//! ```
//!
//! Every entry is validated before the database is touched.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use maxima_api::db::{CatalogStore, ProductRepository};
use maxima_core::product::{ProductDraft, ProductError};

use super::migrate;

/// One catalog entry as written in the seed file.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("the file has no products")]
    Empty,

    #[error("{} invalid entries", .0.len())]
    Invalid(Vec<(usize, ProductError)>),
}

/// Parse and validate a seed file's contents.
///
/// # Errors
///
/// Returns `SeedError::Invalid` listing every bad entry by position.
pub fn parse_catalog(content: &str) -> Result<Vec<ProductDraft>, SeedError> {
    let entries: Vec<SeedProduct> = serde_yaml::from_str(content)?;
    if entries.is_empty() {
        return Err(SeedError::Empty);
    }

    let mut drafts = Vec::with_capacity(entries.len());
    let mut invalid = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        match ProductDraft::new(
            entry.name.as_deref(),
            entry.description.as_deref(),
            entry.price,
            entry.stock,
        ) {
            Ok(draft) => drafts.push(draft),
            Err(e) => invalid.push((index, e)),
        }
    }

    if invalid.is_empty() {
        Ok(drafts)
    } else {
        Err(SeedError::Invalid(invalid))
    }
}

/// Insert the products listed in `file`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, or if the
/// database is unreachable.
pub async fn products(file: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %file.display(), "Loading products from file");
    let content = tokio::fs::read_to_string(file).await?;

    let drafts = match parse_catalog(&content) {
        Ok(drafts) => drafts,
        Err(SeedError::Invalid(errors)) => {
            error!("Catalog validation failed:");
            for (index, err) in &errors {
                error!("  - entry {index}: {err}");
            }
            return Err(SeedError::Invalid(errors).into());
        }
        Err(e) => return Err(e.into()),
    };

    info!(products = drafts.len(), "Catalog validated successfully");
    if dry_run {
        return Ok(());
    }

    let database_url = migrate::database_url()?;
    let pool = maxima_api::db::create_pool(&database_url, 2).await?;
    let catalog = ProductRepository::new(pool);

    for draft in &drafts {
        let product = catalog.insert_product(draft).await?;
        info!(product_id = %product.id, name = %product.name, "Inserted product");
    }

    info!("Seeding complete! {} products inserted", drafts.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_catalog() {
        let drafts = parse_catalog(
            r#"
- name: Caja de cartón
  description: 40x30x30 cm
  price: "2.35"
  stock: 500
- name: Cinta adhesiva
  price: "1.10"
  stock: 0
"#,
        )
        .unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].name(), "Caja de cartón");
        assert_eq!(drafts[0].price(), Decimal::new(235, 2));
        assert_eq!(drafts[1].description(), None);
    }

    #[test]
    fn test_reports_every_invalid_entry() {
        let err = parse_catalog(
            r#"
- name: ""
  price: "1.00"
  stock: 1
- name: Palé
  price: "5.00"
  stock: 3
- name: Film
  price: "-2"
  stock: 1
"#,
        )
        .unwrap_err();

        let SeedError::Invalid(errors) = err else {
            panic!("expected validation errors");
        };
        assert_eq!(
            errors,
            vec![(0, ProductError::NameRequired), (2, ProductError::InvalidPrice)]
        );
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(parse_catalog("[]"), Err(SeedError::Empty)));
    }
}
