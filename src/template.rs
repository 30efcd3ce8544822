//! Named presets: a theme plus optional fixed labels.
//!
//! A "static" design (decorative background with printed labels) and the
//! dynamic recognised layout are the same thing to the renderer: a
//! [`ThemeSpec`] and a fragment list. Templates just package the first half.

use crate::model::{Color, FontSizeClass, GradientDirection, GradientStop, TextFragment, ThemeSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub theme: ThemeSpec,
    /// Labels drawn before (under) the recognised fragments.
    #[serde(default)]
    pub fragments: Vec<TextFragment>,
}

const BUILTIN_NAMES: [&str; 5] = ["aurora", "sunset", "ocean", "mint", "receipt-card"];

impl Template {
    /// Names accepted by [`Template::builtin`].
    pub fn names() -> &'static [&'static str] {
        &BUILTIN_NAMES
    }

    /// Look up a built-in template (case-insensitive).
    pub fn builtin(name: &str) -> Option<Template> {
        let name = name.trim().to_ascii_lowercase();
        let (theme, fragments) = match name.as_str() {
            "aurora" => (aurora(), Vec::new()),
            "sunset" => (
                ThemeSpec::two_stop(
                    Color::rgb(0xf9, 0x73, 0x16),
                    Color::rgb(0xdb, 0x27, 0x77),
                    GradientDirection::Vertical,
                ),
                Vec::new(),
            ),
            "ocean" => (
                ThemeSpec {
                    gradient_stops: vec![
                        GradientStop::new(0.0, Color::rgb(0x0c, 0x4a, 0x6e)),
                        GradientStop::new(0.6, Color::rgb(0x02, 0x84, 0xc7)),
                        GradientStop::new(1.0, Color::rgb(0x22, 0xd3, 0xee)),
                    ],
                    ..ThemeSpec::default()
                }
                .with_texture(6, 0.05),
                Vec::new(),
            ),
            "mint" => (
                ThemeSpec::two_stop(
                    Color::rgb(0x06, 0x5f, 0x46),
                    Color::rgb(0x10, 0xb9, 0x81),
                    GradientDirection::Horizontal,
                ),
                Vec::new(),
            ),
            "receipt-card" => (
                aurora(),
                vec![
                    TextFragment::new("PAYMENT RECEIPT", 50.0, 6.0, FontSizeClass::Large),
                    TextFragment::new("Generated copy", 50.0, 97.0, FontSizeClass::Small),
                ],
            ),
            _ => return None,
        };
        Some(Template {
            name,
            theme,
            fragments,
        })
    }
}

fn aurora() -> ThemeSpec {
    ThemeSpec::default().with_texture(4, 0.06)
}
