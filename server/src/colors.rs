// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

/// Palette used for label badges, handed out in creation order.
const LABEL_PALETTE: [&str; 20] = [
    "#1f77b4", // Muted blue
    "#ff7f0e", // Orange
    "#2ca02c", // Green
    "#d62728", // Red
    "#9467bd", // Purple
    "#8c564b", // Brown
    "#e377c2", // Pink
    "#7f7f7f", // Grey
    "#bcbd22", // Olive
    "#17becf", // Cyan
    "#aec7e8", // Light blue
    "#ffbb78", // Light orange
    "#98df8a", // Light green
    "#ff9896", // Light red
    "#c5b0d5", // Light purple
    "#c49c94", // Light brown
    "#f7b6d2", // Light pink
    "#c7c7c7", // Light grey
    "#dbdb8d", // Light olive
    "#9edae5", // Light cyan
];

/// Color for the label created after `existing` others. Wraps around once
/// the palette is exhausted.
pub fn label_color(existing: usize) -> &'static str {
    LABEL_PALETTE[existing % LABEL_PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_colors_follow_palette_and_wrap() {
        assert_eq!(label_color(0), "#1f77b4");
        assert_eq!(label_color(1), "#ff7f0e");
        assert_eq!(label_color(20), label_color(0));
        assert_ne!(label_color(19), label_color(18));
    }
}
