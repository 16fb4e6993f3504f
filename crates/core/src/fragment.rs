use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::money::Money;

fn re_amount() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2})").expect("invalid regex")
    })
}

/// Largest amount a single receipt line is trusted to carry.
const MAX_PLAUSIBLE_CENTS: i64 = 99_999_999;

/// One OCR-recognized text span with a normalized position.
///
/// Coordinates are in page-relative units (0.0–1.0, top-left origin).
/// Produced by the upstream OCR-normalization service; immutable once
/// built. `id` is the origin index and uniquely identifies the fragment
/// for usage tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub id: usize,
    pub text: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub center_x: f64,
    #[serde(default)]
    pub center_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub is_amount: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Fragment {
    /// Build a fragment at a point position, sniffing the amount from its
    /// text. The main constructor used by tests and synthetic inputs.
    pub fn new(id: usize, text: &str, center_x: f64, center_y: f64) -> Self {
        let (is_amount, amount) = match sniff_amount(text) {
            Some(m) => (true, Some(m)),
            None => (false, None),
        };
        Fragment {
            id,
            text: text.trim().to_string(),
            x: center_x,
            y: center_y,
            center_x,
            center_y,
            width: None,
            height: None,
            is_amount,
            amount,
            confidence: None,
        }
    }

    /// Normalize a fragment as received from upstream: assign the origin
    /// index, trim text, default missing centers to the corner position,
    /// and detect the amount when the upstream flag is absent.
    pub fn normalized(mut self, id: usize) -> Self {
        self.id = id;
        self.text = self.text.trim().to_string();
        if self.center_x == 0.0 {
            self.center_x = self.x;
        }
        if self.center_y == 0.0 {
            self.center_y = self.y;
        }
        if !self.is_amount {
            if let Some(m) = sniff_amount(&self.text) {
                self.is_amount = true;
                self.amount = Some(m);
            }
        } else if self.amount.is_none() {
            self.amount = sniff_amount(&self.text);
            self.is_amount = self.amount.is_some();
        }
        self
    }

    /// Copy with coordinates rounded to five decimal places, for the
    /// verbatim passthrough in the parse result.
    pub fn rounded(&self) -> Self {
        let mut f = self.clone();
        f.x = round5(f.x);
        f.y = round5(f.y);
        f.center_x = round5(f.center_x);
        f.center_y = round5(f.center_y);
        f.width = f.width.map(round5);
        f.height = f.height.map(round5);
        f
    }

    /// The amount, when this fragment carries one.
    pub fn money(&self) -> Option<Money> {
        if self.is_amount {
            self.amount
        } else {
            None
        }
    }
}

fn round5(v: f64) -> f64 {
    (v * 100_000.0).round() / 100_000.0
}

/// Detect a currency amount in fragment text: optional `$`, comma
/// thousands, mandatory cents. Bounded to amounts a receipt could
/// plausibly print.
pub fn sniff_amount(text: &str) -> Option<Money> {
    let caps = re_amount().captures(text.trim())?;
    let money = Money::parse(caps.get(1)?.as_str())?;
    if money.to_cents() > MAX_PLAUSIBLE_CENTS || money.to_cents() < 0 {
        return None;
    }
    Some(money)
}
