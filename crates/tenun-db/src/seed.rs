use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::Database;

/// Catalog reference data loaded from a JSON file at startup.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub weavers: Vec<WeaverSeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct WeaverSeed {
    pub weaver_id: String,
    pub name: String,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub specialization: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub price: i64,
    pub category: String,
    pub description: Option<String>,
    pub meaning_motif: Option<String>,
    pub long_description: Option<String>,
    pub long_meaning_motif: Option<String>,
    pub video_url: Option<String>,
    pub photo_url: Option<String>,
    pub weaver_id: String,
}

impl CatalogSeed {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog seed {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing catalog seed {}", path.display()))
    }
}

impl Database {
    /// Inserts weavers and products that are not present yet. Existing rows,
    /// including their current stock, are left untouched.
    pub fn seed_catalog(&self, seed: &CatalogSeed) -> Result<(usize, usize)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut weavers = 0;
            let mut products = 0;

            for w in &seed.weavers {
                weavers += tx.execute(
                    "INSERT OR IGNORE INTO weavers
                        (weaver_id, name, bio, address, phone_number, specialization)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        w.weaver_id,
                        w.name,
                        w.bio,
                        w.address,
                        w.phone_number,
                        serde_json::to_string(&w.specialization)?,
                    ],
                )?;
            }

            for p in &seed.products {
                products += tx.execute(
                    "INSERT OR IGNORE INTO products
                        (product_id, name, quantity, price, category, description, meaning_motif,
                         long_description, long_meaning_motif, video_url, photo_url, weaver_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    rusqlite::params![
                        p.product_id,
                        p.name,
                        p.quantity,
                        p.price,
                        p.category,
                        p.description,
                        p.meaning_motif,
                        p.long_description,
                        p.long_meaning_motif,
                        p.video_url,
                        p.photo_url,
                        p.weaver_id,
                    ],
                )?;
            }

            tx.commit()?;
            info!("Catalog seed applied: {} new weavers, {} new products", weavers, products);
            Ok((weavers, products))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_twice_keeps_existing_stock() {
        let db = Database::open_in_memory().unwrap();
        let seed: CatalogSeed = serde_json::from_str(
            r#"{
                "weavers": [{"weaver_id": "W1", "name": "Mama Tamu", "bio": null,
                             "address": null, "phone_number": null}],
                "products": [{"product_id": "P1", "name": "Lau Pahudu", "quantity": 3,
                              "price": 250000, "category": "sarung", "description": null,
                              "meaning_motif": null, "long_description": null,
                              "long_meaning_motif": null, "video_url": null,
                              "photo_url": null, "weaver_id": "W1"}]
            }"#,
        )
        .unwrap();

        assert_eq!(db.seed_catalog(&seed).unwrap(), (1, 1));
        db.with_conn_mut(|conn| {
            conn.execute("UPDATE products SET quantity = 1 WHERE product_id = 'P1'", [])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.seed_catalog(&seed).unwrap(), (0, 0));
        assert_eq!(db.get_product("P1").unwrap().unwrap().quantity, 1);
    }
}
