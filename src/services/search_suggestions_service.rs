//! Suggestions for the search box, matched accent- and case-insensitively.

pub const MAX_SUGGESTIONS: usize = 8;

pub const SEARCH_SUGGESTIONS: &[&str] = &[
    "Apartamento en venta",
    "Alquiler de casas",
    "Autos usados",
    "Autos nuevos",
    "Alquiler de oficinas",
    "Bicicletas montaña",
    "Bolsos de marca",
    "Celulares Samsung",
    "Computadoras portátiles",
    "Consolas de videojuegos",
    "Cámaras digitales",
    "Departamentos amueblados",
    "Electrodomésticos",
    "Empleo tiempo completo",
    "Equipos de sonido",
    "Escritorios de oficina",
    "Guitarras eléctricas",
    "Herramientas de construcción",
    "Impresoras multifunción",
    "iPhone usado",
    "Joyas de plata",
    "Juegos de mesa",
    "Lavadoras automáticas",
    "Libros de segunda mano",
    "Maquinaria industrial",
    "Mesas de comedor",
    "Motos usadas",
    "Muebles de jardín",
    "Neveras",
    "Notebooks gamer",
    "Ofertas de trabajo",
    "Pantallas LED",
    "Patinetes eléctricos",
    "Pisos en alquiler",
    "Playstation 5",
    "Relojes inteligentes",
    "Ropa de marca",
    "Sillas gamer",
    "Sofás de cuero",
    "Tablets Android",
    "Televisores 4K",
    "Terrenos en venta",
    "Teclados mecánicos",
    "Teléfonos móviles",
    "Vehículos comerciales",
    "Vestidos de fiesta",
    "Zapatillas deportivas",
    "Aire acondicionado",
    "Aspiradoras robot",
    "Bicicletas eléctricas",
    "Cámaras de seguridad",
    "Colchones ortopédicos",
    "Drones con cámara",
    "Equipos de gimnasio",
    "Freidoras de aire",
    "Instrumentos musicales",
    "Juguetes educativos",
    "Laptops gaming",
    "Llantas para auto",
    "Máquinas de coser",
    "Nintendo Switch",
    "Perfumes originales",
    "Proyectores HD",
    "Relojes de lujo",
    "Sillas de oficina",
    "Smartphones Xiaomi",
    "Tablets Apple",
    "Xbox Series X",
    "Accesorios para mascotas",
    "Audífonos inalámbricos",
    "Boletos para conciertos",
    "Equipos de camping",
];

/// Prefix matches first, then the remaining substring matches, each group in
/// list order.
pub fn suggest(query: &str) -> Vec<&'static str> {
    let needle = fold(query.trim());
    if needle.is_empty() {
        return Vec::new();
    }

    let folded: Vec<(&'static str, String)> =
        SEARCH_SUGGESTIONS.iter().map(|s| (*s, fold(s))).collect();

    let prefix = folded.iter().filter(|(_, f)| f.starts_with(&needle));
    let contains = folded
        .iter()
        .filter(|(_, f)| !f.starts_with(&needle) && f.contains(&needle));

    prefix
        .chain(contains)
        .map(|(s, _)| *s)
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Lowercases and strips Spanish diacritics.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_ignores_accents_and_case() {
        assert_eq!(suggest("CAMARAS"), vec!["Cámaras digitales", "Cámaras de seguridad"]);
        assert!(suggest("telefono").contains(&"Teléfonos móviles"));
    }

    #[test]
    fn prefix_matches_come_first() {
        let hits = suggest("alquiler");
        assert_eq!(hits[..2], ["Alquiler de casas", "Alquiler de oficinas"]);
        assert!(hits.contains(&"Pisos en alquiler"));
    }

    #[test]
    fn results_are_capped() {
        assert!(suggest("a").len() <= MAX_SUGGESTIONS);
        assert!(suggest("   ").is_empty());
        assert!(suggest("zzz").is_empty());
    }
}
