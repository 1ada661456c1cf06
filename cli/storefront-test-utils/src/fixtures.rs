//! JSON bodies in the shapes the storefront API answers with.

use std::ops::RangeInclusive;

use serde_json::{json, Value};

/// A product as returned by the listing endpoint.
pub fn product(id: u64) -> Value {
    json!({
        "id": id,
        "name": format!("Phone {id}"),
        "slug": format!("phone-{id}"),
        "category": {"id": 1, "name": "Mobiles", "slug": "mobiles"},
        "brand": {"id": 2, "name": "Samsung", "slug": "samsung"},
        "price": "19999.00",
        "sale_price": null,
        "stock_quantity": 5,
        "is_active": true,
        "is_featured": false,
        "images": [
            {"image": format!("/media/products/{id}.jpg"), "is_primary": true},
        ],
        "average_rating": "4.5",
        "review_count": 12,
        "specifications": {"ram": "8GB"},
    })
}

/// A bare array of `n` products.
pub fn products_array(n: u64) -> Value {
    Value::Array((1..=n).map(product).collect())
}

/// A paginated envelope holding `n` products out of `count`.
pub fn products_envelope(n: u64, count: u64) -> Value {
    products_page(1..=n, count, n < count)
}

/// A paginated envelope holding the products with `ids`.
pub fn products_page(ids: RangeInclusive<u64>, count: u64, has_next: bool) -> Value {
    json!({
        "count": count,
        "next": has_next.then_some("https://shop.example.com/api/products/?page=2"),
        "previous": null,
        "results": ids.map(product).collect::<Vec<_>>(),
    })
}

/// Filter metadata for the `mobiles` category.
pub fn filter_options() -> Value {
    json!({
        "brands": [
            {"id": 2, "name": "Samsung", "slug": "samsung", "product_count": 10},
            {"id": 3, "name": "Apple", "slug": "apple", "product_count": 4},
        ],
        "colors": [
            {"name": "Black", "hex_code": "#000000"},
            {"name": "Blue", "hex_code": "#0000FF"},
        ],
        "price_range": {"min_price": "4999.00", "max_price": "149999.00"},
        "specification_fields": [
            {"name": "ram", "type": "select", "options": ["4GB", "8GB", "12GB"]},
        ],
    })
}

pub fn categories() -> Value {
    json!([
        {"id": 1, "name": "Mobiles", "slug": "mobiles", "parent": null, "product_count": 10},
        {"id": 4, "name": "Tablets", "slug": "tablets", "parent": null, "product_count": 0},
        {"id": 5, "name": "Cases", "slug": "cases", "parent": 1},
    ])
}

pub fn brands() -> Value {
    json!({
        "count": 2,
        "results": [
            {"id": 2, "name": "Samsung", "slug": "samsung"},
            {"id": 3, "name": "Apple", "slug": "apple"},
        ],
    })
}
