use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CategoryRow {
    pub id: i64,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SubCategoryRow {
    pub id: i64,
    pub category_id: i64,
    pub name: Option<String>,
    pub tag: Option<String>,
}

/// Which form family (and attribute set) a category uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    Property,
    Vehicle,
    Job,
    Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: &'static str,
    pub tag: &'static str,
}

// Mirrors the rows seeded by the initial migration.
pub static CATEGORIES: [Category; 11] = [
    Category { id: 1, name: "Inmuebles", tag: "inmuebles" },
    Category { id: 2, name: "Vehículos", tag: "vehiculos" },
    Category { id: 3, name: "Empleos", tag: "empleos" },
    Category { id: 4, name: "Entretenimiento", tag: "entretenimiento" },
    Category { id: 5, name: "Moda y Belleza", tag: "moda-belleza" },
    Category { id: 6, name: "Deportes y Fitness", tag: "deportes-fitness" },
    Category { id: 7, name: "Hogar", tag: "hogar" },
    Category { id: 8, name: "Bebés y Niños", tag: "bebes" },
    Category { id: 9, name: "Electrónica", tag: "electronica" },
    Category { id: 10, name: "Repuestos", tag: "repuestos" },
    Category { id: 11, name: "Servicios", tag: "servicios" },
];

pub const PROPERTY_CATEGORY_ID: i64 = 1;
pub const VEHICLE_CATEGORY_ID: i64 = 2;
pub const JOB_CATEGORY_ID: i64 = 3;

impl Category {
    pub fn by_tag(tag: &str) -> Option<&'static Category> {
        let tag = tag.trim();
        CATEGORIES.iter().find(|c| c.tag.eq_ignore_ascii_case(tag))
    }

    pub fn by_id(id: i64) -> Option<&'static Category> {
        CATEGORIES.iter().find(|c| c.id == id)
    }

    pub fn kind(&self) -> CategoryKind {
        CategoryKind::for_category_id(self.id)
    }

    pub fn products() -> impl Iterator<Item = &'static Category> {
        CATEGORIES
            .iter()
            .filter(|c| c.kind() == CategoryKind::Product)
    }
}

impl CategoryKind {
    pub fn for_category_id(id: i64) -> CategoryKind {
        match id {
            PROPERTY_CATEGORY_ID => CategoryKind::Property,
            VEHICLE_CATEGORY_ID => CategoryKind::Vehicle,
            JOB_CATEGORY_ID => CategoryKind::Job,
            _ => CategoryKind::Product,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Property => "property",
            CategoryKind::Vehicle => "vehicle",
            CategoryKind::Job => "job",
            CategoryKind::Product => "product",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique() {
        for (i, a) in CATEGORIES.iter().enumerate() {
            for b in CATEGORIES.iter().skip(i + 1) {
                assert_ne!(a.tag, b.tag);
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn lookup_by_tag_ignores_case_and_whitespace() {
        assert_eq!(Category::by_tag(" Inmuebles ").map(|c| c.id), Some(1));
        assert_eq!(Category::by_tag("vehiculos").map(|c| c.id), Some(2));
        assert!(Category::by_tag("barcos").is_none());
    }

    #[test]
    fn product_categories_exclude_the_dedicated_forms() {
        let ids: Vec<i64> = Category::products().map(|c| c.id).collect();
        assert_eq!(ids, (4..=11).collect::<Vec<_>>());
        assert_eq!(CategoryKind::for_category_id(3), CategoryKind::Job);
    }
}
