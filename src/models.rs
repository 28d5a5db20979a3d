use chrono::Local;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::slide_normalizer::{fit_to_budget, SlideRules};

// The poses offered by the front end
pub const YOGA_ASANAS: [&str; 19] = [
    "Tadasana", "Ardha Chakrasana", "Kati Chakrasana", "Dandasana", "Bhadrasana",
    "Padmasana", "Vajrasana", "Utthan Mandukasana", "Kakasana", "Parvatasana",
    "Makarasana", "Uttanpadasana", "Setu Bandhasana", "Viparita Karani",
    "Saral Matsyasana", "Shavasana", "Pranayama", "Yoga Mudras", "Meditation",
];

// Define the structure for an image attached to a slide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideImage {
    pub url: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub photographer: String,
    #[serde(default)]
    pub source: String,
}

/// One normalized slide: a title, an optional subheading and its bullets.
///
/// Once built through [`SlideRecord::new`] or [`SlideRecord::from_body`] the
/// bullet list holds between `min_bullets` and `max_bullets` entries of the
/// rules it was built with. Bullets keep their leading marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideRecord {
    pub title: String,
    pub subheading: String,
    pub bullets: Vec<String>,
    pub image: Option<SlideImage>,
}

impl SlideRecord {
    /// Build a record, padding bullets with the filler and dropping the excess.
    pub fn new(title: String, subheading: String, mut bullets: Vec<String>, rules: &SlideRules) -> Self {
        while bullets.len() < rules.min_bullets {
            bullets.push(rules.filler_bullet.clone());
        }
        bullets.truncate(rules.max_bullets);

        Self {
            title,
            subheading,
            bullets,
            image: None,
        }
    }

    /// Parse a single slide body.
    ///
    /// The first line is the title regardless of its shape. The remaining
    /// lines go through the same subheading and bullet rules the deck
    /// normalizer applies.
    pub fn from_body(body: &str, rules: &SlideRules) -> Self {
        let mut lines = body.split('\n');
        let title = lines.next().unwrap_or_default().trim().to_string();

        let mut subheading = String::new();
        let mut bullets = Vec::new();
        for line in lines.map(str::trim).filter(|line| !line.is_empty()) {
            if rules.is_subheading(line) {
                subheading = line.to_string();
            } else if rules.is_bullet(line) {
                bullets.push(line.to_string());
            }
        }

        Self::new(title, subheading, bullets, rules)
    }

    pub fn with_image(mut self, image: Option<SlideImage>) -> Self {
        self.image = image;
        self
    }

    /// Title, subheading and bullets joined by newlines, cut to the character budget.
    pub fn render(&self, char_budget: usize) -> String {
        let full = format!("{}\n{}\n{}", self.title, self.subheading, self.bullets.join("\n"));
        fit_to_budget(&full, char_budget)
    }

    /// The title as shown in a slide header.
    pub fn display_title(&self, max_chars: usize) -> String {
        if self.title.chars().count() > max_chars {
            let head: String = self.title.chars().take(max_chars).collect();
            format!("{}...", head)
        } else {
            self.title.clone()
        }
    }
}

// Define the structure for a slide as exchanged with the front end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationSlide {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<SlideImage>,
}

// Define the structure for a generated presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub asanas: Vec<String>,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub slides: Vec<PresentationSlide>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl Presentation {
    pub fn new(asana: &str, student_name: &str) -> Self {
        let id = rand::thread_rng().gen_range(1000..=9999);

        Self {
            id,
            title: format!("{} - Comprehensive Yoga Guide", asana),
            asanas: vec![asana.to_string()],
            student_name: student_name.to_string(),
            generated_at: Local::now().to_rfc3339(),
            slides: Vec::new(),
            status: "success".to_string(),
            message: "Created premium comprehensive presentation! 🎨".to_string(),
        }
    }

    /// Append the normalized records as numbered slides.
    pub fn push_records(&mut self, records: Vec<SlideRecord>, char_budget: usize) {
        for record in records {
            let number = self.slides.len() + 1;
            self.slides.push(PresentationSlide {
                title: format!("Slide {}", number),
                content: record.render(char_budget),
                image: record.image,
            });
        }
    }

    /// True when there are neither poses nor slides to export.
    pub fn is_empty(&self) -> bool {
        self.asanas.is_empty() && self.slides.is_empty()
    }

    /// Rebuild slide records from the client-held content strings.
    pub fn records(&self, rules: &SlideRules) -> Vec<SlideRecord> {
        self.slides
            .iter()
            .map(|slide| SlideRecord::from_body(&slide.content, rules).with_image(slide.image.clone()))
            .collect()
    }

    /// The download name: `comprehensive_yoga_<pose>[_<student>].pptx`.
    pub fn file_name(&self) -> String {
        let slug = |s: &str| s.replace(' ', "_").to_lowercase();

        let mut name = format!(
            "comprehensive_yoga_{}",
            slug(self.asanas.first().map(String::as_str).unwrap_or("practice"))
        );
        if !self.student_name.is_empty() {
            name.push('_');
            name.push_str(&slug(&self.student_name));
        }
        name.push_str(".pptx");
        name
    }
}

// Request body for POST /generate
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub asanas: Vec<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default = "default_include_images")]
    pub include_images: bool,
}

fn default_include_images() -> bool {
    true
}

// Request body for POST /download-pptx
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub presentation: Option<Presentation>,
}

// Response for GET /asanas
#[derive(Debug, Serialize)]
pub struct AsanaCatalogResponse {
    pub asanas: Vec<&'static str>,
    pub total: usize,
    pub message: &'static str,
}

// Response for GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub features: Vec<&'static str>,
}
