//! Entity spelling tables for states, crops and IMD sub-divisions.
//!
//! Lookups are exact, case-insensitive membership tests against each
//! canonical entry's variant list. Unknown names pass through unchanged.

use std::collections::{BTreeMap, HashMap};

const STATE_VARIANTS: &[(&str, &[&str])] = &[
    (
        "Andaman and Nicobar Islands",
        &["Andaman & Nicobar Islands", "A & N Islands"],
    ),
    ("Andhra Pradesh", &["Andhra Pradesh", "AP"]),
    ("Arunachal Pradesh", &["Arunachal Pradesh", "Arunanchal Pradesh"]),
    ("Assam", &["Assam"]),
    ("Bihar", &["Bihar"]),
    ("Chhattisgarh", &["Chhattisgarh", "Chattisgarh", "Chhatisgarh"]),
    ("Goa", &["Goa"]),
    ("Gujarat", &["Gujarat", "Gujrat"]),
    ("Haryana", &["Haryana"]),
    ("Himachal Pradesh", &["Himachal Pradesh", "HP"]),
    ("Jharkhand", &["Jharkhand", "Jarkhand"]),
    ("Karnataka", &["Karnataka", "Karnatak"]),
    ("Kerala", &["Kerala"]),
    ("Madhya Pradesh", &["Madhya Pradesh", "MP", "M.P."]),
    ("Maharashtra", &["Maharashtra", "Maharastra"]),
    ("Manipur", &["Manipur"]),
    ("Meghalaya", &["Meghalaya"]),
    ("Mizoram", &["Mizoram"]),
    ("Nagaland", &["Nagaland"]),
    ("Odisha", &["Odisha", "Orissa"]),
    ("Punjab", &["Punjab", "Panjab"]),
    ("Rajasthan", &["Rajasthan"]),
    ("Sikkim", &["Sikkim"]),
    ("Tamil Nadu", &["Tamil Nadu", "TN", "Tamilnadu"]),
    ("Telangana", &["Telangana"]),
    ("Tripura", &["Tripura"]),
    ("Uttar Pradesh", &["Uttar Pradesh", "UP", "U.P."]),
    ("Uttarakhand", &["Uttarakhand", "Uttaranchal"]),
    ("West Bengal", &["West Bengal", "WB", "W.B."]),
    ("Delhi", &["Delhi", "NCT of Delhi", "New Delhi"]),
    ("Chandigarh", &["Chandigarh"]),
    ("Puducherry", &["Puducherry", "Pondicherry"]),
    (
        "Jammu and Kashmir",
        &["Jammu and Kashmir", "Jammu & Kashmir", "J&K"],
    ),
    ("Ladakh", &["Ladakh"]),
    (
        "Dadra and Nagar Haveli and Daman and Diu",
        &[
            "Dadra and Nagar Haveli and Daman and Diu",
            "Dadra & Nagar Haveli",
            "Daman & Diu",
        ],
    ),
    ("Lakshadweep", &["Lakshadweep", "Lakshadweep Islands"]),
];

const CROP_VARIANTS: &[(&str, &[&str])] = &[
    ("Rice", &["Rice", "Paddy", "Dhan"]),
    ("Wheat", &["Wheat", "Gehun"]),
    ("Maize", &["Maize", "Corn", "Makka"]),
    ("Jowar", &["Jowar", "Sorghum"]),
    ("Bajra", &["Bajra", "Pearl Millet"]),
    ("Ragi", &["Ragi", "Finger Millet"]),
    ("Barley", &["Barley", "Jau"]),
    ("Arhar/Tur", &["Arhar", "Tur", "Pigeon Pea", "Arhar/Tur"]),
    ("Gram", &["Gram", "Chana", "Chickpea"]),
    ("Moong", &["Moong", "Green Gram", "Mung"]),
    ("Urad", &["Urad", "Black Gram"]),
    ("Masoor", &["Masoor", "Lentil"]),
    ("Groundnut", &["Groundnut", "Peanut", "Mungfali"]),
    (
        "Rapeseed & Mustard",
        &["Rapeseed", "Mustard", "Sarson", "Rapeseed & Mustard"],
    ),
    ("Soybean", &["Soybean", "Soyabean", "Soya"]),
    ("Sunflower", &["Sunflower", "Surajmukhi"]),
    ("Sesame", &["Sesame", "Sesamum", "Til"]),
    ("Niger Seed", &["Niger Seed", "Nigerseed"]),
    ("Castor Seed", &["Castor Seed", "Castor"]),
    ("Sugarcane", &["Sugarcane", "Sugar Cane", "Ganna"]),
    ("Cotton", &["Cotton", "Kapas"]),
    ("Jute", &["Jute", "Jute & Mesta"]),
    ("Tea", &["Tea", "Chai"]),
    ("Coffee", &["Coffee"]),
    ("Rubber", &["Rubber"]),
    ("Turmeric", &["Turmeric", "Haldi"]),
    ("Coriander", &["Coriander", "Dhaniya"]),
    ("Chillies", &["Chillies", "Chilli", "Chili", "Mirchi"]),
    ("Ginger", &["Ginger", "Adrak"]),
    ("Potato", &["Potato", "Aloo"]),
    ("Onion", &["Onion", "Pyaz"]),
];

// Composite sub-divisions are assigned to their primary state.
const SUBDIVISION_STATES: &[(&str, &str)] = &[
    ("Andaman & Nicobar Islands", "Andaman and Nicobar Islands"),
    ("Arunanchal Pradesh", "Arunachal Pradesh"),
    ("Nagaland Manipur Mizoram Tripura", "Nagaland"),
    ("Sub Himalayan West Bengal & Sikkim", "West Bengal"),
    ("Gangetic West Bengal", "West Bengal"),
    ("Orissa", "Odisha"),
    ("Jharkhand", "Jharkhand"),
    ("Bihar", "Bihar"),
    ("East Uttar Pradesh", "Uttar Pradesh"),
    ("West Uttar Pradesh", "Uttar Pradesh"),
    ("Uttarakhand", "Uttarakhand"),
    ("Haryana Delhi & Chandigarh", "Haryana"),
    ("Punjab", "Punjab"),
    ("Himachal Pradesh", "Himachal Pradesh"),
    ("Jammu & Kashmir", "Jammu and Kashmir"),
    ("West Rajasthan", "Rajasthan"),
    ("East Rajasthan", "Rajasthan"),
    ("West Madhya Pradesh", "Madhya Pradesh"),
    ("East Madhya Pradesh", "Madhya Pradesh"),
    ("Gujarat Region", "Gujarat"),
    ("Saurashtra & Kutch", "Gujarat"),
    ("Konkan & Goa", "Maharashtra"),
    ("Madhya Maharashtra", "Maharashtra"),
    ("Marathwada", "Maharashtra"),
    ("Vidarbha", "Maharashtra"),
    ("Chhattisgarh", "Chhattisgarh"),
    ("Coastal Andhra Pradesh", "Andhra Pradesh"),
    ("Telangana", "Telangana"),
    ("Rayalseema", "Andhra Pradesh"),
    ("Tamil Nadu", "Tamil Nadu"),
    ("Coastal Karnataka", "Karnataka"),
    ("North Interior Karnataka", "Karnataka"),
    ("South Interior Karnataka", "Karnataka"),
    ("Kerala", "Kerala"),
    ("Lakshadweep", "Lakshadweep"),
    ("Assam & Meghalaya", "Assam"),
];

/// Case-insensitive variant → canonical spelling lookup.
#[derive(Debug, Clone, Default)]
pub struct NameCanon {
    lookup: HashMap<String, String>,
}

impl NameCanon {
    pub fn from_variants(variants: &[(&str, &[&str])]) -> Self {
        let mut lookup = HashMap::new();
        for (canonical, spellings) in variants {
            lookup.insert(canonical.to_lowercase(), canonical.to_string());
            for spelling in *spellings {
                lookup
                    .entry(spelling.trim().to_lowercase())
                    .or_insert_with(|| canonical.to_string());
            }
        }
        Self { lookup }
    }

    pub fn canonical<'a>(&'a self, raw: &'a str) -> &'a str {
        self.lookup
            .get(&raw.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(raw)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

/// IMD sub-division → state assignment.
#[derive(Debug, Clone, Default)]
pub struct SubdivisionMap {
    states: HashMap<String, String>,
}

impl SubdivisionMap {
    pub fn builtin() -> Self {
        Self::from_pairs(SUBDIVISION_STATES.iter().copied())
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let states = pairs
            .into_iter()
            .map(|(subdivision, state)| (subdivision.to_string(), state.to_string()))
            .collect();
        Self { states }
    }

    pub fn state_for(&self, subdivision: &str) -> Option<&str> {
        self.states.get(subdivision.trim()).map(String::as_str)
    }

    /// All sub-divisions assigned to `state`, sorted by name.
    pub fn subdivisions_of(&self, state: &str) -> Vec<&str> {
        let mut subdivisions: Vec<&str> = self
            .states
            .iter()
            .filter(|(_, assigned)| assigned.as_str() == state)
            .map(|(subdivision, _)| subdivision.as_str())
            .collect();
        subdivisions.sort_unstable();
        subdivisions
    }

    /// Reverse index: state → its sub-divisions.
    pub fn by_state(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut index: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (subdivision, state) in &self.states {
            index.entry(state.as_str()).or_default().push(subdivision.as_str());
        }
        for subdivisions in index.values_mut() {
            subdivisions.sort_unstable();
        }
        index
    }
}

/// Spelling tables injected into the production normalizer and the
/// rainfall aggregation.
#[derive(Debug, Clone, Default)]
pub struct EntityTables {
    pub states: NameCanon,
    pub crops: NameCanon,
    pub subdivisions: SubdivisionMap,
}

impl EntityTables {
    pub fn builtin() -> Self {
        Self {
            states: NameCanon::from_variants(STATE_VARIANTS),
            crops: NameCanon::from_variants(CROP_VARIANTS),
            subdivisions: SubdivisionMap::builtin(),
        }
    }
}
