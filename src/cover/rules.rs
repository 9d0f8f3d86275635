use image::DynamicImage;
use std::collections::HashSet;

use crate::config::CoverConfig;

/// Side length of the thumbnail used for color statistics.
const SAMPLE_SIZE: u32 = 64;

/// Bits kept per channel when counting distinct colors.
const PALETTE_BITS: u8 = 2;

/// What a rule gets to look at. Each stage is cheaper than the next, so URL
/// rules run before any network fetch and pixel rules run last.
#[derive(Clone, Copy)]
pub enum Subject<'a> {
    Url(&'a str),
    Bytes(&'a [u8]),
    Image(&'a DynamicImage),
}

/// A heuristic that flags a provider's "no cover available" stand-in.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceholderRule {
    /// The URL contains a known placeholder marker.
    UrlPattern(Vec<String>),
    /// The payload is a GIF. Several providers serve their placeholders as GIFs.
    GifSignature,
    /// Either side is smaller than this many pixels.
    MinDimension(u32),
    /// At most this many distinct colors after palette reduction.
    FewColors(usize),
    /// Mean channel intensity above this value (blank, near-white tile).
    Bright(u8),
}

impl PlaceholderRule {
    pub fn name(&self) -> &'static str {
        match self {
            PlaceholderRule::UrlPattern(_) => "url-pattern",
            PlaceholderRule::GifSignature => "gif-signature",
            PlaceholderRule::MinDimension(_) => "min-dimension",
            PlaceholderRule::FewColors(_) => "few-colors",
            PlaceholderRule::Bright(_) => "bright",
        }
    }

    /// Returns the reason for rejection, or `None` if the subject passes
    /// (or the rule does not apply at this stage).
    pub fn check(&self, subject: Subject<'_>) -> Option<String> {
        match (self, subject) {
            (PlaceholderRule::UrlPattern(patterns), Subject::Url(url)) => {
                let lower = url.to_ascii_lowercase();
                patterns
                    .iter()
                    .find(|p| !p.is_empty() && lower.contains(&p.to_ascii_lowercase()))
                    .map(|p| format!("URL contains placeholder marker {p:?}"))
            }
            (PlaceholderRule::GifSignature, Subject::Bytes(bytes)) => bytes
                .starts_with(b"GIF8")
                .then(|| "payload is a GIF".to_string()),
            (PlaceholderRule::MinDimension(min), Subject::Image(img)) => {
                let (w, h) = (img.width(), img.height());
                (w < *min || h < *min).then(|| format!("{w}x{h} is below {min}px"))
            }
            (PlaceholderRule::FewColors(max), Subject::Image(img)) => {
                let colors = distinct_colors(img);
                (colors <= *max).then(|| format!("only {colors} distinct colors"))
            }
            (PlaceholderRule::Bright(threshold), Subject::Image(img)) => {
                let mean = mean_intensity(img);
                (mean > f64::from(*threshold)).then(|| format!("mean intensity {mean:.1}"))
            }
            _ => None,
        }
    }
}

/// An ordered chain of placeholder rules. The first match rejects.
#[derive(Debug, Clone, Default)]
pub struct RuleChain {
    rules: Vec<PlaceholderRule>,
}

impl RuleChain {
    pub fn new(rules: Vec<PlaceholderRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &CoverConfig) -> Self {
        let mut rules = Vec::new();
        if !config.placeholder_patterns.is_empty() {
            rules.push(PlaceholderRule::UrlPattern(config.placeholder_patterns.clone()));
        }
        if config.reject_gif {
            rules.push(PlaceholderRule::GifSignature);
        }
        if config.min_dimension > 0 {
            rules.push(PlaceholderRule::MinDimension(config.min_dimension));
        }
        rules.push(PlaceholderRule::FewColors(config.max_colors));
        rules.push(PlaceholderRule::Bright(config.brightness_threshold));
        Self { rules }
    }

    pub fn rules(&self) -> &[PlaceholderRule] {
        &self.rules
    }

    /// Run every rule against `subject`. Returns the first rule that matched and why.
    pub fn screen(&self, subject: Subject<'_>) -> Option<(&'static str, String)> {
        self.rules
            .iter()
            .find_map(|rule| rule.check(subject).map(|reason| (rule.name(), reason)))
    }
}

fn sample(img: &DynamicImage) -> image::RgbImage {
    img.thumbnail(SAMPLE_SIZE, SAMPLE_SIZE).to_rgb8()
}

fn distinct_colors(img: &DynamicImage) -> usize {
    let shift = 8 - PALETTE_BITS;
    sample(img)
        .pixels()
        .map(|p| (p[0] >> shift, p[1] >> shift, p[2] >> shift))
        .collect::<HashSet<_>>()
        .len()
}

fn mean_intensity(img: &DynamicImage) -> f64 {
    let rgb = sample(img);
    let (sum, count) = rgb
        .pixels()
        .flat_map(|p| p.0)
        .fold((0u64, 0u64), |(s, n), c| (s + u64::from(c), n + 1));
    if count == 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}
