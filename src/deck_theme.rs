use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// An sRGB colour, written into slide XML as `RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub name: &'static str,
    pub primary: Rgb,
    pub secondary: Rgb,
    pub accent: Rgb,
    pub background: Rgb,
    pub text: Rgb,
    pub highlight: Rgb,
    pub success: Rgb,
    pub warning: Rgb,
    pub light_bg: Rgb,
}

pub static PALETTES: [Palette; 2] = [
    Palette {
        name: "Modern Wellness",
        primary: Rgb(74, 144, 226),
        secondary: Rgb(76, 175, 80),
        accent: Rgb(255, 193, 7),
        background: Rgb(250, 250, 250),
        text: Rgb(33, 33, 33),
        highlight: Rgb(156, 39, 176),
        success: Rgb(56, 142, 60),
        warning: Rgb(255, 152, 0),
        light_bg: Rgb(245, 248, 250),
    },
    Palette {
        name: "Earthy Yoga",
        primary: Rgb(121, 85, 72),
        secondary: Rgb(104, 159, 56),
        accent: Rgb(255, 167, 38),
        background: Rgb(253, 249, 236),
        text: Rgb(55, 45, 45),
        highlight: Rgb(175, 180, 43),
        success: Rgb(67, 160, 71),
        warning: Rgb(229, 115, 115),
        light_bg: Rgb(252, 243, 231),
    },
];

/// Second stop of every slide's background gradient
pub const GRADIENT_END: Rgb = Rgb(240, 245, 250);

/// Chooses the palette of an exported deck.
///
/// A seeded selector always picks the same palette; an unseeded one draws
/// from OS entropy on every export.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThemeSelector {
    seed: Option<u64>,
}

impl ThemeSelector {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn pick(&self) -> &'static Palette {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        PALETTES.choose(&mut rng).unwrap_or(&PALETTES[0])
    }
}
