//! Adaptive Card 1.5 document for generated images.
//!
//! See <https://adaptivecards.microsoft.com/>.

use serde::Serialize;

pub const CARD_SCHEMA: &str = "https://adaptivecards.io/schemas/adaptive-card.json";
pub const CARD_VERSION: &str = "1.5";

/// Top-level card.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveCard {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub version: &'static str,
    pub layouts: Vec<AreaGridLayout>,
    pub body: Vec<CardElement>,
    pub fallback_text: String,
    pub speak: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_action: Option<OpenUrlAction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AreaGridLayout {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub areas: Vec<GridArea>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridArea {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

/// Body elements, tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum CardElement {
    #[serde(rename_all = "camelCase")]
    Image {
        url: String,
        #[serde(rename = "grid.area")]
        grid_area: String,
        alt_text: String,
        spacing: &'static str,
        style: &'static str,
    },
    #[serde(rename_all = "camelCase")]
    TextBlock {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        weight: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        wrap: Option<bool>,
        #[serde(rename = "grid.area")]
        grid_area: &'static str,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenUrlAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url: String,
}

fn image_area(index: usize) -> String {
    if index == 0 {
        "imageArea".to_string()
    } else {
        format!("imageArea{}", index + 1)
    }
}

impl AdaptiveCard {
    /// Card showing every image in order, then the prompt.
    ///
    /// Each image gets its own grid row; the prompt label and text follow.
    pub fn for_images(prompt: &str, urls: &[String]) -> Self {
        let mut areas: Vec<GridArea> = (0..urls.len())
            .map(|i| GridArea {
                name: image_area(i),
                row: (i > 0).then_some(i + 1),
            })
            .collect();
        let label_row = urls.len() + 1;
        areas.push(GridArea {
            name: "labelArea".to_string(),
            row: Some(label_row),
        });
        areas.push(GridArea {
            name: "promptArea".to_string(),
            row: Some(label_row + 1),
        });

        let mut body: Vec<CardElement> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| CardElement::Image {
                url: url.clone(),
                grid_area: image_area(i),
                alt_text: prompt.to_string(),
                spacing: "None",
                style: "RoundedCorners",
            })
            .collect();
        body.push(CardElement::TextBlock {
            text: "Prompt".to_string(),
            weight: Some("Bolder"),
            wrap: None,
            grid_area: "labelArea",
        });
        body.push(CardElement::TextBlock {
            text: prompt.to_string(),
            weight: None,
            wrap: Some(true),
            grid_area: "promptArea",
        });

        Self {
            kind: "AdaptiveCard",
            schema: CARD_SCHEMA,
            version: CARD_VERSION,
            layouts: vec![AreaGridLayout {
                kind: "Layout.AreaGrid",
                areas,
            }],
            body,
            fallback_text: format!("Generated Image: {}", prompt),
            speak: prompt.to_string(),
            select_action: urls.first().map(|url| OpenUrlAction {
                kind: "Action.OpenUrl",
                url: url.clone(),
            }),
        }
    }
}
