//! Physical constants and dielectric material presets.

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_817e-12;
pub const VACUUM_PERMEABILITY: f64 = 1.256_637_061_4e-6;
pub const COPPER_CONDUCTIVITY: f64 = 5.8e7;

/// A dielectric material with its relative permittivity and loss tangent.
#[derive(Debug, Clone, Copy)]
pub struct DielectricMaterial {
    pub name: &'static str,
    pub epsilon_r: f64,
    pub loss_tangent: f64,
}

pub const FR4_STANDARD: DielectricMaterial = DielectricMaterial {
    name: "FR4 Standard",
    epsilon_r: 4.5,
    loss_tangent: 0.02,
};

pub const FR4_HIGH_TG: DielectricMaterial = DielectricMaterial {
    name: "FR4 High-Tg",
    epsilon_r: 4.4,
    loss_tangent: 0.018,
};

pub const ROGERS_4350B: DielectricMaterial = DielectricMaterial {
    name: "Rogers 4350B",
    epsilon_r: 3.48,
    loss_tangent: 0.0037,
};

pub const ROGERS_4003C: DielectricMaterial = DielectricMaterial {
    name: "Rogers 4003C",
    epsilon_r: 3.55,
    loss_tangent: 0.0027,
};

pub const ISOLA_370HR: DielectricMaterial = DielectricMaterial {
    name: "Isola 370HR",
    epsilon_r: 4.0,
    loss_tangent: 0.015,
};

const MATERIALS: &[(&[&str], DielectricMaterial)] = &[
    (&["fr4", "fr-4", "fr4 standard", "standard fr4"], FR4_STANDARD),
    (&["fr4 high-tg", "fr4_high_tg", "high-tg fr4"], FR4_HIGH_TG),
    (&["rogers 4350b", "ro4350b", "rogers4350b"], ROGERS_4350B),
    (&["rogers 4003c", "ro4003c", "rogers4003c"], ROGERS_4003C),
    (&["isola 370hr", "370hr", "isola370hr"], ISOLA_370HR),
];

/// Case-insensitive material lookup by name, with common aliases.
pub fn get_material(name: &str) -> Option<DielectricMaterial> {
    let lower = name.to_lowercase();
    MATERIALS
        .iter()
        .find(|(aliases, _)| aliases.iter().any(|a| *a == lower))
        .map(|(_, m)| *m)
}

pub fn get_material_or_default(name: &str) -> DielectricMaterial {
    get_material(name).unwrap_or(FR4_STANDARD)
}

/// Copper weight in oz to thickness in mm (1 oz = 35 um).
pub fn copper_thickness_from_oz(oz: f64) -> f64 {
    oz * 0.035
}
