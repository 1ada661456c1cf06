use std::fmt::{self, Display, Write};

use itertools::Itertools;
use storefront_catalog::{Facets, FilterTag, Product, ProductsPage, ResultSource, display_price};

/// One line per product: id, name, brand and price.
pub struct DisplayProduct<'a>(pub &'a Product);

impl Display for DisplayProduct<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let product = self.0;
        let price = if product.is_on_sale() {
            format!(
                "{} (was {})",
                display_price(product.effective_price()),
                display_price(product.price)
            )
        } else {
            display_price(product.price)
        };
        let mut flags = Vec::new();
        if product.is_featured {
            flags.push("featured");
        }
        if !product.in_stock() {
            flags.push("out of stock");
        }

        write!(
            f,
            "{:>7}  {:<40}  {:<16}  {}",
            product.id,
            product.name,
            product.brand.name,
            price
        )?;
        if !flags.is_empty() {
            write!(f, "  [{}]", flags.join(", "))?;
        }
        Ok(())
    }
}

/// A page of products as shown by `browse` and `search`.
pub struct DisplayPage<'a> {
    pub page: &'a ProductsPage,
}

impl Display for DisplayPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let page = self.page;
        if let Some(category) = &page.empty_category {
            return write!(f, "There are no products in category '{category}' yet.");
        }

        for product in &page.products {
            writeln!(f, "{}", DisplayProduct(product))?;
        }

        if page.source != ResultSource::Fallback {
            writeln!(f)?;
            write!(
                f,
                "Page {} of {} ({} products)",
                page.page,
                page.total_pages.max(1),
                page.count
            )?;
        }
        Ok(())
    }
}

/// Active filters, as removable tags.
pub fn describe_tags(tags: &[FilterTag]) -> Option<String> {
    (!tags.is_empty()).then(|| format!("Filtered by: {}", tags.iter().join(", ")))
}

/// The filter sidebar of a catalog page.
pub struct DisplayFacets<'a>(pub &'a Facets);

impl Display for DisplayFacets<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let facets = self.0;
        let mut out = String::new();

        writeln!(out, "Categories:")?;
        for category in &facets.categories {
            match category.product_count {
                Some(count) => writeln!(out, "  {} ({count})", category.slug)?,
                None => writeln!(out, "  {}", category.slug)?,
            }
        }

        writeln!(out, "Brands:")?;
        for brand in facets.selectable_brands() {
            writeln!(out, "  {:>5}  {}", brand.id, brand.name)?;
        }

        writeln!(
            out,
            "Colors: {}",
            facets.options.colors.iter().map(|c| &c.name).join(", ")
        )?;
        writeln!(
            out,
            "Price: {} - {}",
            display_price(facets.options.price_range.min),
            display_price(facets.options.price_range.max)
        )?;

        for field in &facets.options.specification_fields {
            writeln!(out, "{}: {}", field.name, field.options.iter().join(", "))?;
        }

        write!(f, "{}", out.trim_end())
    }
}
