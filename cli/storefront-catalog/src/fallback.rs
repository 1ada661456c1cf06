//! Built-in sample products.
//!
//! Shown when no live products could be loaded and no category is active,
//! so the storefront never renders an empty landing page.

use std::collections::BTreeMap;

use crate::types::{NamedRef, Product, ProductImages};

fn sample(id: u64, name: &str, slug: &str, category: &str, price: f64, sale: Option<f64>) -> Product {
    Product {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        category: NamedRef {
            id: 0,
            name: category.to_string(),
            slug: None,
        },
        brand: NamedRef::unknown(),
        price,
        sale_price: sale,
        stock_quantity: 10,
        is_available: true,
        is_active: true,
        is_featured: true,
        images: ProductImages::default(),
        rating: 4.5,
        review_count: 0,
        specifications: BTreeMap::new(),
    }
}

/// The fixed list of fallback products.
pub fn sample_products() -> Vec<Product> {
    vec![
        sample(900001, "Wireless Earbuds", "sample-wireless-earbuds", "Audio", 2999.0, Some(1999.0)),
        sample(900002, "Smartphone 128GB", "sample-smartphone-128gb", "Mobiles", 18999.0, None),
        sample(900003, "Laptop Backpack", "sample-laptop-backpack", "Accessories", 1499.0, Some(999.0)),
        sample(900004, "Smart Watch", "sample-smart-watch", "Wearables", 4999.0, None),
    ]
}
