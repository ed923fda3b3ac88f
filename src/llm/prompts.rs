//! OCR prompt constants and the region-enumerated prompt builder.
//!
//! The region list is the contract between the local detector and the
//! model: the model answers per region number, and the parser maps those
//! numbers back onto the detector's boxes.

use crate::model::TextBlock;

pub const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Default base instruction. Users can replace it in Settings; the region
/// list is always appended.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are a precise OCR engine. The image contains text regions that were already located by an on-device detector. Each region is listed below with its bounding box in normalized coordinates (0-1, origin top-left).

<rules>
1. Read the text inside each listed region exactly as written, in its original language.
2. Do not translate, summarize, correct spelling, or add commentary.
3. Keep the region numbers exactly as given. Skip a region only if it contains no readable text.
4. Respond with ONLY a JSON array, no prose and no markdown:
[{"region": 1, "text": "..."}, {"region": 2, "text": "..."}]
</rules>"#;

/// Append the 1-indexed region list to the base instruction.
///
/// Each line reads `Region N: x=0.100, y=0.200, w=0.300, h=0.050`.
pub fn build_region_prompt(base: &str, priors: &[TextBlock]) -> String {
    let regions = format_regions(priors);
    if regions.is_empty() {
        return base.trim_end().to_string();
    }
    format!("{}\n\nRegions:\n{}", base.trim_end(), regions)
}

pub fn format_regions(priors: &[TextBlock]) -> String {
    priors
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let b = &block.bounding_box;
            format!(
                "Region {}: x={:.3}, y={:.3}, w={:.3}, h={:.3}",
                i + 1,
                b.x,
                b.y,
                b.width,
                b.height
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedRect;

    #[test]
    fn regions_are_one_indexed_with_three_decimals() {
        let priors = vec![
            TextBlock::new("a", NormalizedRect::new(0.1, 0.2, 0.3, 0.05), 0.9),
            TextBlock::new("b", NormalizedRect::new(0.12345, 0.5, 0.25, 0.0626), 0.9),
        ];
        assert_eq!(
            format_regions(&priors),
            "Region 1: x=0.100, y=0.200, w=0.300, h=0.050\n\
             Region 2: x=0.123, y=0.500, w=0.250, h=0.063"
        );
    }

    #[test]
    fn prompt_starts_with_base_instruction() {
        let priors = vec![TextBlock::new("a", NormalizedRect::new(0.0, 0.0, 1.0, 1.0), 1.0)];
        let prompt = build_region_prompt("Read it.\n", &priors);
        assert_eq!(
            prompt,
            "Read it.\n\nRegions:\nRegion 1: x=0.000, y=0.000, w=1.000, h=1.000"
        );
    }

    #[test]
    fn no_priors_leaves_base_only() {
        assert_eq!(build_region_prompt(DEFAULT_OCR_PROMPT, &[]), DEFAULT_OCR_PROMPT);
    }
}
