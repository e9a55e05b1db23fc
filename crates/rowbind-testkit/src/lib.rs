// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use rowbind_app::{MemoryDatabase, Value};
use rusqlite::{Connection, params};
use std::path::PathBuf;
use time::macros::format_description;
use time::{Date, Duration, Month};

/// Orders schema shared by the SQLite tests and the demo database.
pub const SCHEMA: &str = "
CREATE TABLE customers (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  city TEXT NOT NULL DEFAULT ''
);
CREATE TABLE orders (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  active INTEGER NOT NULL DEFAULT 1,
  customer_id INTEGER REFERENCES customers (id),
  created_on TEXT
);
CREATE TABLE order_lines (
  id INTEGER PRIMARY KEY,
  order_id INTEGER NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
  item TEXT NOT NULL,
  quantity INTEGER NOT NULL DEFAULT 1,
  unit_cents INTEGER NOT NULL DEFAULT 0,
  shipped INTEGER NOT NULL DEFAULT 0
);
";

/// `(table, id sequence)` pairs for [`SCHEMA`].
pub const SEQUENCES: [(&str, &str); 3] = [
    ("customers", "customers_id_seq"),
    ("orders", "orders_id_seq"),
    ("order_lines", "order_lines_id_seq"),
];

const ORDER_COLUMNS: [&str; 5] = ["id", "name", "active", "customer_id", "created_on"];
const LINE_COLUMNS: [&str; 6] = ["id", "order_id", "item", "quantity", "unit_cents", "shipped"];
const CUSTOMER_COLUMNS: [&str; 3] = ["id", "name", "city"];

const REFERENCE_YEAR: i32 = 2025;

const FIRST_NAMES: [&str; 12] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Quinn", "Parker", "Drew", "Robin",
    "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 12] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Reed", "Turner", "Flores", "Price",
    "Foster", "Brooks",
];
const CITIES: [&str; 10] = [
    "Austin",
    "Seattle",
    "Denver",
    "Madison",
    "Raleigh",
    "Portland",
    "Boise",
    "Nashville",
    "Columbus",
    "Omaha",
];

const ORDER_KINDS: [&str; 8] = [
    "Restock",
    "Repair parts",
    "Site delivery",
    "Workshop",
    "Backorder",
    "Sample",
    "Warranty",
    "Rush",
];
const ITEMS: [(&str, i64); 12] = [
    ("Hex bolt M6", 12),
    ("Hex bolt M8", 18),
    ("Flat washer", 4),
    ("Lock nut", 9),
    ("Wood screw", 6),
    ("Wall anchor", 15),
    ("Hinge", 320),
    ("Drawer slide", 1150),
    ("Cabinet pull", 475),
    ("Shelf bracket", 260),
    ("Pipe clamp", 540),
    ("Cable tie", 3),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub name: String,
    pub active: bool,
    pub created_on: Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub item: String,
    pub quantity: i64,
    pub unit_cents: i64,
    pub shipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedCounts {
    pub customers: usize,
    pub orders: usize,
    pub order_lines: usize,
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }
}

/// Seeded generator of plausible customers, orders and order lines.
#[derive(Debug, Clone)]
pub struct OrderFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl OrderFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn customer(&mut self) -> Customer {
        Customer {
            name: format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES)),
            city: self.pick(&CITIES).to_owned(),
        }
    }

    pub fn order(&mut self) -> Order {
        let number = 100 + self.rng.int_n(900);
        Order {
            name: format!("{} #{number}", self.pick(&ORDER_KINDS)),
            active: self.rng.chance(70),
            created_on: self.date_in_year(REFERENCE_YEAR),
        }
    }

    pub fn order_line(&mut self) -> OrderLine {
        let (item, unit_cents) = ITEMS[self.rng.int_n(ITEMS.len())];
        OrderLine {
            item: item.to_owned(),
            quantity: 1 + self.rng.int_n(24) as i64,
            unit_cents,
            shipped: self.rng.chance(40),
        }
    }

    pub fn date_in_year(&mut self, year: i32) -> Date {
        let Ok(start) = Date::from_calendar_date(year, Month::January, 1) else {
            return fixture_date();
        };
        let days = if time::util::is_leap_year(year) { 366 } else { 365 };
        start + Duration::days(self.rng.int_n(days) as i64)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

/// Creates the orders schema on a raw connection.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).context("create orders schema")
}

/// Inserts `customers` customers, each with one to three orders of one to
/// four lines.
pub fn seed(conn: &Connection, faker: &mut OrderFaker, customers: usize) -> Result<SeedCounts> {
    let mut counts = SeedCounts::default();
    for _ in 0..customers {
        let customer = faker.customer();
        conn.execute(
            "INSERT INTO customers (name, city) VALUES (?1, ?2)",
            params![customer.name, customer.city],
        )
        .context("insert customer")?;
        let customer_id = conn.last_insert_rowid();
        counts.customers += 1;

        for _ in 0..=faker.int_n(3) {
            let order = faker.order();
            conn.execute(
                "INSERT INTO orders (name, active, customer_id, created_on)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    order.name,
                    order.active,
                    customer_id,
                    format_date(order.created_on)?
                ],
            )
            .context("insert order")?;
            let order_id = conn.last_insert_rowid();
            counts.orders += 1;

            for _ in 0..=faker.int_n(4) {
                let line = faker.order_line();
                conn.execute(
                    "INSERT INTO order_lines (order_id, item, quantity, unit_cents, shipped)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        order_id,
                        line.item,
                        line.quantity,
                        line.unit_cents,
                        line.shipped
                    ],
                )
                .context("insert order line")?;
                counts.order_lines += 1;
            }
        }
    }
    Ok(counts)
}

/// Orders, order lines and customers in an in-process store, with the same
/// columns as [`SCHEMA`] and sequences that continue after the seeded ids.
pub fn memory_orders(faker: &mut OrderFaker, orders: usize) -> Result<MemoryDatabase> {
    let db = MemoryDatabase::new();
    db.create_table("customers", &CUSTOMER_COLUMNS)?;
    db.create_table("orders", &ORDER_COLUMNS)?;
    db.create_table("order_lines", &LINE_COLUMNS)?;
    db.require_not_null("orders", "name")?;
    db.require_not_null("order_lines", "item")?;

    let customer_count = orders.div_ceil(2).max(1);
    for id in 1..=customer_count {
        let customer = faker.customer();
        db.insert(
            "customers",
            vec![
                Value::Integer(id as i64),
                Value::Text(customer.name),
                Value::Text(customer.city),
            ],
        )?;
    }

    let mut line_id = 0;
    for id in 1..=orders {
        let order = faker.order();
        let customer_id = 1 + faker.int_n(customer_count);
        db.insert(
            "orders",
            vec![
                Value::Integer(id as i64),
                Value::Text(order.name),
                Value::from(order.active),
                Value::Integer(customer_id as i64),
                Value::Text(format_date(order.created_on)?),
            ],
        )?;
        for _ in 0..=faker.int_n(3) {
            line_id += 1;
            let line = faker.order_line();
            db.insert(
                "order_lines",
                vec![
                    Value::Integer(line_id),
                    Value::Integer(id as i64),
                    Value::Text(line.item),
                    Value::Integer(line.quantity),
                    Value::Integer(line.unit_cents),
                    Value::from(line.shipped),
                ],
            )?;
        }
    }

    db.create_sequence("customers_id_seq", customer_count as i64 + 1);
    db.create_sequence("orders_id_seq", orders as i64 + 1);
    db.create_sequence("order_lines_id_seq", line_id + 1);
    Ok(db)
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("rowbind.db");
    Ok((dir, db_path))
}

pub fn fixture_date() -> Date {
    time::macros::date!(2025 - 06 - 15)
}

pub fn format_date(date: Date) -> Result<String> {
    date.format(format_description!("[year]-[month]-[day]"))
        .context("format date")
}
