//! PostgreSQL order repository
//!
//! Orders are spread over four tables (`orders`, `delivery`, `payment`,
//! `items`). Saves run in one transaction and are keyed on `order_uid` with
//! `ON CONFLICT DO NOTHING`, so a redelivered message never duplicates rows.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::domain::{Delivery, Item, Order, OrderRepository, Payment};
use crate::error::{Error, Result};

/// Schema bootstrap, applied idempotently at startup
const SCHEMA: &str = include_str!("../../migrations/001_create_orders.sql");

const INSERT_ORDER: &str = "
    INSERT INTO orders
        (order_uid, track_number, entry, locale, internal_signature,
         customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING";

const INSERT_DELIVERY: &str = "
    INSERT INTO delivery
        (order_uid, name, phone, zip, city, address, region, email)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (order_uid) DO NOTHING";

const INSERT_PAYMENT: &str = "
    INSERT INTO payment
        (order_uid, transaction, request_id, currency, provider, amount,
         payment_dt, bank, delivery_cost, goods_total, custom_fee)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING";

const INSERT_ITEM: &str = "
    INSERT INTO items
        (order_uid, position, chrt_id, track_number, price, rid,
         name, sale, size, total_price, nm_id, brand, status)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    ON CONFLICT (order_uid, position) DO NOTHING";

const SELECT_HEADER: &str = "
    SELECT
        o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
        o.customer_id, o.delivery_service, o.shardkey, o.sm_id,
        o.date_created, o.oof_shard,
        d.name, d.phone, d.zip, d.city, d.address, d.region, d.email,
        p.transaction, p.request_id, p.currency, p.provider, p.amount,
        p.payment_dt, p.bank, p.delivery_cost, p.goods_total, p.custom_fee
    FROM orders o
        JOIN delivery d ON o.order_uid = d.order_uid
        JOIN payment p ON o.order_uid = p.order_uid";

const SELECT_ITEMS: &str = "
    SELECT
        order_uid, chrt_id, track_number, price, rid,
        name, sale, size, total_price, nm_id, brand, status
    FROM items
    WHERE order_uid = ANY($1)
    ORDER BY order_uid, position";

/// Order repository over a deadpool-managed PostgreSQL pool.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: Pool,
}

impl PostgresOrderRepository {
    pub fn new(pool: Pool) -> Self {
        debug!("Initializing PostgreSQL order repository");
        Self { pool }
    }

    /// Build a pool from configuration. Connections are opened lazily.
    pub fn from_config(config: &PostgresConfig) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| Error::Config(format!("Failed to create pool: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        info!("Order schema ready");
        Ok(())
    }

    async fn select_items(&self, order_uids: &[String]) -> Result<HashMap<String, Vec<Item>>> {
        let client = self.pool.get().await?;
        let rows = client.query(SELECT_ITEMS, &[&order_uids]).await?;

        let mut items: HashMap<String, Vec<Item>> = HashMap::new();
        for row in rows {
            let order_uid: String = row.try_get("order_uid")?;
            items.entry(order_uid).or_default().push(item_from_row(&row)?);
        }
        Ok(items)
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[instrument(skip(self))]
    async fn get_order(&self, order_uid: &str) -> Result<Order> {
        let row = {
            let client = self.pool.get().await?;
            let query = format!("{} WHERE o.order_uid = $1", SELECT_HEADER);
            client.query_opt(query.as_str(), &[&order_uid]).await?
        };

        let Some(row) = row else {
            return Err(Error::OrderNotFound);
        };

        let mut order = order_from_row(&row)?;
        let mut items = self.select_items(&[order.order_uid.clone()]).await?;
        order.items = items.remove(&order.order_uid).unwrap_or_default();
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn get_orders(&self, limit: usize) -> Result<Vec<Order>> {
        let rows = {
            let client = self.pool.get().await?;
            let query = format!(
                "{} ORDER BY o.date_created DESC, o.order_uid LIMIT $1",
                SELECT_HEADER
            );
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            client.query(query.as_str(), &[&limit]).await?
        };

        if rows.is_empty() {
            return Err(Error::OrdersNotFound);
        }

        let mut orders = rows
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>>>()?;

        let order_uids: Vec<String> = orders.iter().map(|o| o.order_uid.clone()).collect();
        let mut items = self.select_items(&order_uids).await?;
        for order in &mut orders {
            order.items = items.remove(&order.order_uid).unwrap_or_default();
        }

        debug!(count = orders.len(), "Selected newest orders");
        Ok(orders)
    }

    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    async fn save_order(&self, order: &Order) -> Result<()> {
        let mut client = self.pool.get().await?;
        // Dropping the transaction without commit rolls it back
        let tx = client.transaction().await?;

        let inserted = tx
            .execute(
                INSERT_ORDER,
                &[
                    &order.order_uid,
                    &order.track_number,
                    &order.entry,
                    &order.locale,
                    &order.internal_signature,
                    &order.customer_id,
                    &order.delivery_service,
                    &order.shard_key,
                    &order.sm_id,
                    &order.date_created,
                    &order.oof_shard,
                ],
            )
            .await
            .map_err(|e| Error::from(e).context("failed to insert row into orders"))?;

        if inserted == 0 {
            debug!("Order already stored");
            return Ok(());
        }

        let d = &order.delivery;
        tx.execute(
            INSERT_DELIVERY,
            &[
                &order.order_uid,
                &d.name,
                &d.phone,
                &d.zip,
                &d.city,
                &d.address,
                &d.region,
                &d.email,
            ],
        )
        .await
        .map_err(|e| Error::from(e).context("failed to insert row into delivery"))?;

        let p = &order.payment;
        tx.execute(
            INSERT_PAYMENT,
            &[
                &order.order_uid,
                &p.transaction,
                &p.request_id,
                &p.currency,
                &p.provider,
                &p.amount,
                &p.payment_dt,
                &p.bank,
                &p.delivery_cost,
                &p.goods_total,
                &p.custom_fee,
            ],
        )
        .await
        .map_err(|e| Error::from(e).context("failed to insert row into payment"))?;

        for (position, item) in order.items.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| Error::Internal("too many items in order".into()))?;
            tx.execute(
                INSERT_ITEM,
                &[
                    &order.order_uid,
                    &position,
                    &item.chrt_id,
                    &item.track_number,
                    &item.price,
                    &item.rid,
                    &item.name,
                    &item.sale,
                    &item.size,
                    &item.total_price,
                    &item.nm_id,
                    &item.brand,
                    &item.status,
                ],
            )
            .await
            .map_err(|e| Error::from(e).context("failed to insert row into items"))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::from(e).context("failed to commit transaction"))?;

        debug!(items = order.items.len(), "Order stored");
        Ok(())
    }
}

fn order_from_row(row: &Row) -> Result<Order> {
    Ok(Order {
        order_uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        delivery: Delivery {
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            zip: row.try_get("zip")?,
            city: row.try_get("city")?,
            address: row.try_get("address")?,
            region: row.try_get("region")?,
            email: row.try_get("email")?,
        },
        payment: Payment {
            transaction: row.try_get("transaction")?,
            request_id: row.try_get("request_id")?,
            currency: row.try_get("currency")?,
            provider: row.try_get("provider")?,
            amount: row.try_get("amount")?,
            payment_dt: row.try_get("payment_dt")?,
            bank: row.try_get("bank")?,
            delivery_cost: row.try_get("delivery_cost")?,
            goods_total: row.try_get("goods_total")?,
            custom_fee: row.try_get("custom_fee")?,
        },
        items: Vec::new(),
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shard_key: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: row.try_get("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
    })
}

fn item_from_row(row: &Row) -> Result<Item> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}
