use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};

use tenun_types::models::OrderStatus;

use crate::models::{NewTransaction, ProductRow, TransactionRow, WeaverRow};
use crate::{Database, OptionalExt};

/// Outcome of a payment confirmation attempt.
#[derive(Debug)]
pub enum ConfirmOutcome {
    Confirmed(TransactionRow),
    NotFound,
    /// The transaction is no longer awaiting payment; carries its status.
    NotPending(String),
    /// The product cannot cover the ordered quantity any more.
    OutOfStock,
}

/// Outcome of a manual status override.
#[derive(Debug)]
pub enum StatusOutcome {
    Updated(TransactionRow),
    NotFound,
    Rejected(String),
}

const PRODUCT_COLUMNS: &str = "product_id, name, quantity, price, category, description, meaning_motif,
    long_description, long_meaning_motif, video_url, photo_url, weaver_id";

const TRANSACTION_SELECT: &str = "SELECT t.transaction_id, t.user_id, t.product_id, p.name, p.price,
        t.quantity, t.address, t.phone_number, t.resi, t.total_price, t.status, t.transaction_date
     FROM transactions t
     JOIN products p ON p.product_id = t.product_id";

impl Database {
    // -- Catalog --

    /// Products that still have stock.
    pub fn list_available_products(&self) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM products WHERE quantity > 0 ORDER BY product_id",
                PRODUCT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_product)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_product(&self, product_id: &str) -> Result<Option<ProductRow>> {
        self.with_conn(|conn| query_product(conn, product_id))
    }

    pub fn get_weaver(&self, weaver_id: &str) -> Result<Option<WeaverRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT weaver_id, name, bio, address, phone_number, specialization
                     FROM weavers WHERE weaver_id = ?1",
                    [weaver_id],
                    |row| {
                        Ok((
                            WeaverRow {
                                weaver_id: row.get(0)?,
                                name: row.get(1)?,
                                bio: row.get(2)?,
                                address: row.get(3)?,
                                phone_number: row.get(4)?,
                                specialization: Vec::new(),
                            },
                            row.get::<_, String>(5)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((mut weaver, tags)) => {
                    weaver.specialization = serde_json::from_str(&tags)?;
                    Ok(Some(weaver))
                }
                None => Ok(None),
            }
        })
    }

    // -- Transactions --

    pub fn create_transaction(&self, new: &NewTransaction<'_>) -> Result<TransactionRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO transactions
                    (transaction_id, user_id, product_id, quantity, address, phone_number,
                     resi, total_price, status, transaction_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9)",
                rusqlite::params![
                    new.transaction_id,
                    new.user_id,
                    new.product_id,
                    new.quantity,
                    new.address,
                    new.phone_number,
                    new.total_price,
                    OrderStatus::PendingPayment.as_str(),
                    new.transaction_date,
                ],
            )?;
            query_transaction(conn, new.transaction_id)?
                .ok_or_else(|| anyhow::anyhow!("transaction {} vanished after insert", new.transaction_id))
        })
    }

    pub fn get_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRow>> {
        self.with_conn(|conn| query_transaction(conn, transaction_id))
    }

    pub fn list_user_transactions(&self, user_id: &str) -> Result<Vec<TransactionRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE t.user_id = ?1 ORDER BY t.created_at DESC, t.transaction_id",
                TRANSACTION_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_transaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Marks a pending transaction paid, assigns its tracking code and takes
    /// the ordered quantity out of stock, all in one write transaction. Both
    /// updates are guarded in SQL, so a second confirmation or an exhausted
    /// product changes nothing.
    pub fn confirm_payment(&self, transaction_id: &str, resi: &str) -> Result<ConfirmOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current: Option<(String, String, i64)> = tx
                .query_row(
                    "SELECT status, product_id, quantity FROM transactions WHERE transaction_id = ?1",
                    [transaction_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((status, product_id, quantity)) = current else {
                return Ok(ConfirmOutcome::NotFound);
            };
            if status != OrderStatus::PendingPayment.as_str() {
                return Ok(ConfirmOutcome::NotPending(status));
            }

            let decremented = tx.execute(
                "UPDATE products SET quantity = quantity - ?1
                 WHERE product_id = ?2 AND quantity >= ?1 AND quantity > 0",
                rusqlite::params![quantity, product_id],
            )?;
            if decremented != 1 {
                return Ok(ConfirmOutcome::OutOfStock);
            }

            let paid = tx.execute(
                "UPDATE transactions SET status = ?1, resi = ?2
                 WHERE transaction_id = ?3 AND status = ?4",
                rusqlite::params![
                    OrderStatus::Paid.as_str(),
                    resi,
                    transaction_id,
                    OrderStatus::PendingPayment.as_str(),
                ],
            )?;
            if paid != 1 {
                return Ok(ConfirmOutcome::NotPending(status));
            }

            let row = query_transaction(&tx, transaction_id)?
                .ok_or_else(|| anyhow::anyhow!("transaction {} vanished during confirmation", transaction_id))?;
            tx.commit()?;

            Ok(ConfirmOutcome::Confirmed(row))
        })
    }

    /// Overwrites the status (and optionally the tracking code). `check`
    /// sees the current status and may veto the change; it runs inside the
    /// same write transaction as the update.
    pub fn update_status<F>(
        &self,
        transaction_id: &str,
        new_status: &str,
        resi: Option<&str>,
        check: F,
    ) -> Result<StatusOutcome>
    where
        F: FnOnce(&str) -> std::result::Result<(), String>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM transactions WHERE transaction_id = ?1",
                    [transaction_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(current) = current else {
                return Ok(StatusOutcome::NotFound);
            };
            if let Err(reason) = check(&current) {
                return Ok(StatusOutcome::Rejected(reason));
            }

            tx.execute(
                "UPDATE transactions SET status = ?1, resi = COALESCE(?2, resi)
                 WHERE transaction_id = ?3",
                rusqlite::params![new_status, resi, transaction_id],
            )?;
            let row = query_transaction(&tx, transaction_id)?
                .ok_or_else(|| anyhow::anyhow!("transaction {} vanished during update", transaction_id))?;
            tx.commit()?;

            Ok(StatusOutcome::Updated(row))
        })
    }
}

fn query_product(conn: &Connection, product_id: &str) -> Result<Option<ProductRow>> {
    let sql = format!("SELECT {} FROM products WHERE product_id = ?1", PRODUCT_COLUMNS);
    conn.query_row(&sql, [product_id], map_product).optional()
}

fn query_transaction(conn: &Connection, transaction_id: &str) -> Result<Option<TransactionRow>> {
    let sql = format!("{} WHERE t.transaction_id = ?1", TRANSACTION_SELECT);
    conn.query_row(&sql, [transaction_id], map_transaction).optional()
}

fn map_product(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        product_id: row.get(0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        price: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        meaning_motif: row.get(6)?,
        long_description: row.get(7)?,
        long_meaning_motif: row.get(8)?,
        video_url: row.get(9)?,
        photo_url: row.get(10)?,
        weaver_id: row.get(11)?,
    })
}

fn map_transaction(row: &Row<'_>) -> rusqlite::Result<TransactionRow> {
    Ok(TransactionRow {
        transaction_id: row.get(0)?,
        user_id: row.get(1)?,
        product_id: row.get(2)?,
        product_name: row.get(3)?,
        product_price: row.get(4)?,
        quantity: row.get(5)?,
        address: row.get(6)?,
        phone_number: row.get(7)?,
        resi: row.get(8)?,
        total_price: row.get(9)?,
        status: row.get(10)?,
        transaction_date: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::seed::{CatalogSeed, ProductSeed, WeaverSeed};

    fn seeded(quantity: i64) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("USER0001", "Rambu", "rambu@example.com", "h").unwrap();
        let seed = CatalogSeed {
            weavers: vec![WeaverSeed {
                weaver_id: "W001".into(),
                name: "Mama Tamu".into(),
                bio: None,
                address: Some("Waingapu".into()),
                phone_number: None,
                specialization: vec!["hinggi".into()],
            }],
            products: vec![ProductSeed {
                product_id: "P001".into(),
                name: "Hinggi Kombu".into(),
                quantity,
                price: 100_000,
                category: "kain".into(),
                description: None,
                meaning_motif: None,
                long_description: None,
                long_meaning_motif: None,
                video_url: None,
                photo_url: None,
                weaver_id: "W001".into(),
            }],
        };
        db.seed_catalog(&seed).unwrap();
        db
    }

    fn order(db: &Database, id: &str) -> TransactionRow {
        db.create_transaction(&NewTransaction {
            transaction_id: id,
            user_id: "USER0001",
            product_id: "P001",
            quantity: 1,
            address: "Jl. Ahmad Yani",
            phone_number: "0812",
            total_price: 110_000,
            transaction_date: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
        })
        .unwrap()
    }

    #[test]
    fn creating_an_order_leaves_stock_alone() {
        let db = seeded(1);
        let row = order(&db, "T1");
        assert_eq!(row.status, "pending_payment");
        assert_eq!(row.resi, None);
        assert_eq!(db.get_product("P001").unwrap().unwrap().quantity, 1);
    }

    #[test]
    fn confirmation_decrements_once() {
        let db = seeded(1);
        order(&db, "T1");

        let ConfirmOutcome::Confirmed(row) = db.confirm_payment("T1", "RESI-A").unwrap() else {
            panic!("first confirmation should succeed");
        };
        assert_eq!(row.status, "paid");
        assert_eq!(row.resi.as_deref(), Some("RESI-A"));
        assert_eq!(db.get_product("P001").unwrap().unwrap().quantity, 0);

        assert!(matches!(
            db.confirm_payment("T1", "RESI-B").unwrap(),
            ConfirmOutcome::NotPending(status) if status == "paid"
        ));
        assert_eq!(db.get_product("P001").unwrap().unwrap().quantity, 0);
        assert!(matches!(db.confirm_payment("nope", "R").unwrap(), ConfirmOutcome::NotFound));
    }

    #[test]
    fn sold_out_product_blocks_second_order() {
        let db = seeded(1);
        order(&db, "T1");
        order(&db, "T2");

        assert!(matches!(db.confirm_payment("T1", "R1").unwrap(), ConfirmOutcome::Confirmed(_)));
        assert!(matches!(db.confirm_payment("T2", "R2").unwrap(), ConfirmOutcome::OutOfStock));
        let t2 = db.get_transaction("T2").unwrap().unwrap();
        assert_eq!(t2.status, "pending_payment");
        assert!(db.list_available_products().unwrap().is_empty());
    }

    #[test]
    fn concurrent_confirmations_sell_the_last_unit_once() {
        let db = Arc::new(seeded(1));
        let ids: Vec<String> = (0..8).map(|i| format!("T{}", i)).collect();
        for id in &ids {
            order(&db, id);
        }

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let db = db.clone();
                std::thread::spawn(move || db.confirm_payment(&id, &format!("RESI-{}", id)).unwrap())
            })
            .collect();
        let outcomes: Vec<ConfirmOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let confirmed = outcomes
            .iter()
            .filter(|o| matches!(o, ConfirmOutcome::Confirmed(_)))
            .count();
        assert_eq!(confirmed, 1);
        assert_eq!(outcomes.len() - confirmed, 7);
        assert_eq!(db.get_product("P001").unwrap().unwrap().quantity, 0);
    }

    #[test]
    fn order_total_survives_a_price_change() {
        let db = seeded(1);
        order(&db, "T1");

        db.with_conn_mut(|conn| {
            conn.execute("UPDATE products SET price = 999 WHERE product_id = 'P001'", [])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(db.get_product("P001").unwrap().unwrap().price, 999);
        assert_eq!(db.get_transaction("T1").unwrap().unwrap().total_price, 110_000);

        let ConfirmOutcome::Confirmed(row) = db.confirm_payment("T1", "RESI-A").unwrap() else {
            panic!("confirmation should succeed");
        };
        assert_eq!(row.total_price, 110_000);
    }

    #[test]
    fn status_override_respects_the_check() {
        let db = seeded(2);
        order(&db, "T1");

        let rejected = db
            .update_status("T1", "shipped", None, |_| Err("not paid".into()))
            .unwrap();
        assert!(matches!(rejected, StatusOutcome::Rejected(_)));

        let StatusOutcome::Updated(row) = db
            .update_status("T1", "shipped", Some("RESI-X"), |_| Ok(()))
            .unwrap()
        else {
            panic!("update should apply");
        };
        assert_eq!(row.status, "shipped");
        assert_eq!(row.resi.as_deref(), Some("RESI-X"));

        let StatusOutcome::Updated(row) = db.update_status("T1", "delivered", None, |_| Ok(())).unwrap() else {
            panic!("update should apply");
        };
        assert_eq!(row.resi.as_deref(), Some("RESI-X"));
        assert!(matches!(
            db.update_status("missing", "shipped", None, |_| Ok(())).unwrap(),
            StatusOutcome::NotFound
        ));
    }

    #[test]
    fn weaver_specialization_round_trips() {
        let db = seeded(1);
        let weaver = db.get_weaver("W001").unwrap().unwrap();
        assert_eq!(weaver.specialization, vec!["hinggi".to_string()]);
    }
}
