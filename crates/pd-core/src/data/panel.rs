//! Store × week panel dataset
//!
//! A thin typed layer over [`DataFrame`] that records which columns are the
//! entity and time keys and which columns hold each product's quantity,
//! price and promotion flag. Cleaning happens upstream; `validate` only
//! checks that the cleaning contract holds.

use super::*;

/// Column names for one tracked product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductColumns {
    /// Product label (e.g. a brand name)
    pub name: String,
    /// Units sold
    pub quantity: String,
    /// Shelf price
    pub price: String,
    /// Promotion indicator (0/1)
    pub promotion: Option<String>,
}

impl ProductColumns {
    /// Describe a product by its quantity and price columns
    pub fn new(
        name: impl Into<String>,
        quantity: impl Into<String>,
        price: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            price: price.into(),
            promotion: None,
        }
    }

    /// Attach a promotion flag column
    pub fn with_promotion(mut self, column: impl Into<String>) -> Self {
        self.promotion = Some(column.into());
        self
    }
}

/// Panel of observations, one row per (entity, time period)
#[derive(Debug, Clone)]
pub struct PanelDataset {
    frame: DataFrame,
    entity: String,
    time: String,
    products: Vec<ProductColumns>,
}

impl PanelDataset {
    /// Wrap a frame, naming its entity and time key columns
    pub fn new(frame: DataFrame, entity: impl Into<String>, time: impl Into<String>) -> Result<Self> {
        let entity = entity.into();
        let time = time.into();
        frame.column(&entity)?.level_labels()?;
        frame.column(&time)?.level_labels()?;

        Ok(Self {
            frame,
            entity,
            time,
            products: Vec::new(),
        })
    }

    /// Register a tracked product
    pub fn with_product(mut self, product: ProductColumns) -> Result<Self> {
        self.frame.column(&product.quantity)?;
        self.frame.column(&product.price)?;
        if let Some(promo) = &product.promotion {
            self.frame.column(promo)?;
        }
        self.products.push(product);
        Ok(self)
    }

    /// Underlying frame
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Name of the entity (store) key
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Name of the time key
    pub fn time(&self) -> &str {
        &self.time
    }

    /// Registered products
    pub fn products(&self) -> &[ProductColumns] {
        &self.products
    }

    /// Look up a product by name
    pub fn product(&self, name: &str) -> Option<&ProductColumns> {
        self.products.iter().find(|p| p.name == name)
    }

    /// Number of observations
    pub fn nrows(&self) -> usize {
        self.frame.nrows()
    }

    /// Check the cleaning contract: no missing values, quantity ≥ 0,
    /// price > 0, promotion ∈ {0, 1}
    pub fn validate(&self) -> Result<()> {
        for product in &self.products {
            let quantity = self.frame.float_column(&product.quantity)?;
            for (row, &q) in quantity.iter().enumerate() {
                check_present(&product.quantity, row, q)?;
                if q < 0.0 {
                    return Err(DataError::InvalidValue {
                        column: product.quantity.clone(),
                        row,
                        value: q,
                        reason: "quantity must be non-negative",
                    });
                }
            }

            let price = self.frame.float_column(&product.price)?;
            for (row, &p) in price.iter().enumerate() {
                check_present(&product.price, row, p)?;
                if p <= 0.0 {
                    return Err(DataError::NonPositive {
                        column: product.price.clone(),
                        row,
                        value: p,
                    });
                }
            }

            if let Some(promo_col) = &product.promotion {
                let promo = self.frame.float_column(promo_col)?;
                for (row, &v) in promo.iter().enumerate() {
                    check_present(promo_col, row, v)?;
                    if v != 0.0 && v != 1.0 {
                        return Err(DataError::InvalidValue {
                            column: promo_col.clone(),
                            row,
                            value: v,
                            reason: "promotion flag must be 0 or 1",
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Split rows into (selected, rest) by a boolean mask
    pub fn split(&self, mask: &[bool]) -> Result<(Self, Self)> {
        let inverse: Vec<bool> = mask.iter().map(|&m| !m).collect();
        let selected = self.frame.filter(mask)?;
        let rest = self.frame.filter(&inverse)?;
        Ok((self.with_frame(selected), self.with_frame(rest)))
    }

    /// Split rows by a predicate over one column's values
    pub fn split_by<F>(&self, column: &str, predicate: F) -> Result<(Self, Self)>
    where
        F: Fn(&SeriesValue) -> bool,
    {
        let series = self.frame.column(column)?;
        let mask: Vec<bool> = (0..series.len())
            .map(|i| series.get(i).is_some_and(|v| predicate(&v)))
            .collect();
        self.split(&mask)
    }

    fn with_frame(&self, frame: DataFrame) -> Self {
        Self {
            frame,
            entity: self.entity.clone(),
            time: self.time.clone(),
            products: self.products.clone(),
        }
    }
}

fn check_present(column: &str, row: usize, value: f64) -> Result<()> {
    if value.is_nan() {
        Err(DataError::MissingData {
            column: column.to_string(),
            row,
        })
    } else if value.is_infinite() {
        Err(DataError::InvalidValue {
            column: column.to_string(),
            row,
            value,
            reason: "value must be finite",
        })
    } else {
        Ok(())
    }
}
