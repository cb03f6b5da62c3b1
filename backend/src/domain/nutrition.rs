/// Nutrient content of a common weaning food, in grams
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionItem {
    pub id: u32,
    pub name: &'static str,
    pub protein: f64,
    pub carbohydrate: f64,
    pub fat: f64,
    pub fiber: Option<f64>,
}

const fn item(id: u32, name: &'static str, protein: f64, carbohydrate: f64, fat: f64, fiber: Option<f64>) -> NutritionItem {
    NutritionItem {
        id,
        name,
        protein,
        carbohydrate,
        fat,
        fiber,
    }
}

static NUTRITION_TABLE: [NutritionItem; 9] = [
    item(1, "Nasi Putih", 3.0, 39.8, 0.3, None),
    item(2, "Daging Ayam", 27.0, 0.0, 3.6, None),
    item(3, "Ikan Salmon", 20.0, 0.0, 13.0, None),
    item(4, "Telur Rebus", 6.3, 0.6, 5.3, None),
    item(5, "Bayam Rebus", 2.9, 3.6, 0.4, Some(2.2)),
    item(6, "Wortel Rebus", 0.9, 9.6, 0.2, Some(2.8)),
    item(7, "Kentang Rebus", 2.0, 17.0, 0.1, Some(2.2)),
    item(8, "Tempe", 19.0, 9.0, 8.8, Some(1.4)),
    item(9, "Pisang", 1.1, 22.8, 0.3, Some(2.6)),
];

pub fn nutrition_table() -> &'static [NutritionItem] {
    &NUTRITION_TABLE
}

pub fn find(id: u32) -> Option<&'static NutritionItem> {
    NUTRITION_TABLE.iter().find(|item| item.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_contents() {
        let table = nutrition_table();
        assert_eq!(table.len(), 9);
        assert_eq!(table[0].name, "Nasi Putih");
        assert_eq!(table[8].name, "Pisang");

        let ids: Vec<u32> = table.iter().map(|item| item.id).collect();
        assert_eq!(ids, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_find() {
        let tempe = find(8).unwrap();
        assert_eq!(tempe.protein, 19.0);
        assert_eq!(tempe.fiber, Some(1.4));
        assert_eq!(find(2).unwrap().fiber, None);
        assert!(find(10).is_none());
    }
}
