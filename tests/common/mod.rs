#![allow(dead_code)]

use chrono::NaiveDate;
use salesdash::record::{Dataset, Record};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Builder for test records; anything not set gets a plain default.
#[derive(Clone, Debug)]
pub struct Row(Record);

impl Row {
    pub fn new(region: &str, state: &str, city: &str) -> Self {
        Row(Record {
            order_date: date(2023, 1, 1),
            region: region.to_string(),
            state: state.to_string(),
            city: city.to_string(),
            category: "Furniture".to_string(),
            sub_category: "Chairs".to_string(),
            segment: "Consumer".to_string(),
            sales: Some(0.0),
            profit: Some(0.0),
            quantity: Some(1),
            extra: Vec::new(),
        })
    }

    pub fn on(mut self, y: i32, m: u32, d: u32) -> Self {
        self.0.order_date = date(y, m, d);
        self
    }

    pub fn sales(mut self, sales: f64) -> Self {
        self.0.sales = Some(sales);
        self
    }

    pub fn profit(mut self, profit: f64) -> Self {
        self.0.profit = Some(profit);
        self
    }

    pub fn quantity(mut self, quantity: u64) -> Self {
        self.0.quantity = Some(quantity);
        self
    }

    pub fn category(mut self, category: &str, sub_category: &str) -> Self {
        self.0.category = category.to_string();
        self.0.sub_category = sub_category.to_string();
        self
    }

    pub fn segment(mut self, segment: &str) -> Self {
        self.0.segment = segment.to_string();
        self
    }

    pub fn without_sales(mut self) -> Self {
        self.0.sales = None;
        self
    }

    pub fn build(self) -> Record {
        self.0
    }
}

pub fn dataset(rows: Vec<Row>) -> Dataset {
    Dataset::with_standard_columns(rows.into_iter().map(Row::build).collect())
}

/// East/NY/NYC 100 on 2023-01-05, East/NY/Albany 50 on 2023-02-10,
/// West/CA/LA 75 on 2023-01-20.
pub fn three_rows() -> Dataset {
    dataset(vec![
        Row::new("East", "NY", "NYC")
            .on(2023, 1, 5)
            .sales(100.0)
            .profit(20.0)
            .quantity(2),
        Row::new("East", "NY", "Albany")
            .on(2023, 2, 10)
            .sales(50.0)
            .profit(-5.0)
            .quantity(1)
            .category("Furniture", "Tables"),
        Row::new("West", "CA", "LA")
            .on(2023, 1, 20)
            .sales(75.0)
            .profit(15.0)
            .quantity(3)
            .category("Technology", "Phones")
            .segment("Corporate"),
    ])
}

/// A wider dataset with several states per region and repeated cities.
pub fn regional() -> Dataset {
    dataset(vec![
        Row::new("East", "NY", "NYC").on(2023, 1, 3).sales(10.0),
        Row::new("East", "NJ", "Newark").on(2023, 1, 9).sales(20.0),
        Row::new("West", "CA", "LA").on(2023, 2, 1).sales(30.0),
        Row::new("East", "NY", "Buffalo").on(2023, 2, 14).sales(40.0),
        Row::new("West", "WA", "Seattle").on(2023, 3, 2).sales(50.0),
        Row::new("Central", "TX", "Austin").on(2023, 3, 20).sales(60.0),
        Row::new("West", "CA", "San Diego").on(2023, 4, 7).sales(70.0),
        Row::new("East", "NY", "NYC").on(2023, 4, 30).sales(80.0),
    ])
}
