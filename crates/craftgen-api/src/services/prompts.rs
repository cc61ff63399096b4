//! Prompt templates for concept synthesis, image stages, analysis and chat.

use craftgen_core::{ConversationTurn, DesignConcept};

// =============================================================================
// CONCEPT
// =============================================================================

pub const CONCEPT_SYSTEM_PROMPT: &str = r##"You are a senior industrial designer specialising in products that carry traditional craft and intangible cultural heritage into contemporary everyday use.

Given a creative idea and optional heritage source material, design one product concept. Ground the cultural context in the source material when it is relevant; otherwise rely on general knowledge of traditional culture.

Respond with a single JSON object and nothing else, using exactly these camelCase fields:
{
  "conceptName": string,
  "designPhilosophy": string,
  "culturalContext": string,
  "formFactor": string,
  "dimensions": string,
  "userInteraction": string,
  "materials": [{"name": string, "finish": string}],
  "colors": [{"name": string, "hex": string}],
  "keyFeatures": [string]
}
Provide at least one material and one color. Hex codes use the form "#RRGGBB"."##;

/// Render prior turns as a role-tagged block.
///
/// Turns missing a role or content are skipped. Empty history renders as an
/// empty string.
pub fn history_block(history: &[ConversationTurn]) -> String {
    let mut turns = history.iter().filter_map(ConversationTurn::parts).peekable();
    if turns.peek().is_none() {
        return String::new();
    }
    let mut block = String::from("[Conversation so far]\n");
    for (role, content) in turns {
        block.push_str(&role.to_uppercase());
        block.push_str(": ");
        block.push_str(content);
        block.push('\n');
    }
    block.push_str("\n[Current request]\n");
    block
}

pub fn concept_user_prompt(idea: &str, context: &str, history: &[ConversationTurn]) -> String {
    format!(
        "{}Creative idea:\n{}\n\nHeritage source material:\n{}\n",
        history_block(history),
        idea,
        context
    )
}

// =============================================================================
// IMAGE STAGES
// =============================================================================

pub const BLUEPRINT_NEGATIVE_PROMPT: &str =
    "photo, realistic, 3D render, oversaturated, blurry, messy, low quality, watermark";

pub const RENDER_NEGATIVE_PROMPT: &str = "blurry, low quality, deformed, waxy, AI artifacts, text, watermark, messy composition, cartoon, hand-drawn, sketch lines";

pub fn blueprint_prompt(concept: &DesignConcept) -> String {
    format!(
        "Hand-drawn industrial design sketch, technical drawing style. Subject: {}. \
         Design philosophy: {}. Form: {}. Includes dimension callouts and material notes, \
         fluid linework, pencil sketch with light watercolor wash, engineering aesthetic, \
         high definition, white background, three views (front, side, top) and a detailed \
         exploded structure view.",
        concept.concept_name, concept.design_philosophy, concept.form_factor
    )
}

pub fn render_prompt(concept: &DesignConcept) -> String {
    format!(
        "Professional studio product photography of an industrial design piece. Subject: {}. \
         Design philosophy: {}. Form: {}. Materials and craft: {}. Color scheme: {}. \
         Cinematic lighting, 8K ultra detailed, hyperreal, clean solid background, \
         award-winning industrial design, commercial photography style.",
        concept.concept_name,
        concept.design_philosophy,
        concept.form_factor,
        concept.materials_joined(" "),
        concept.colors_joined()
    )
}

// =============================================================================
// ANALYSIS
// =============================================================================

pub const MARKET_SYSTEM_PROMPT: &str = "You are a consumer-market analyst for design-led cultural products. Respond with a single JSON object with the fields \"targetAudience\", \"marketSize\", \"competitors\" (array), \"pricing\", \"opportunities\" (array) and \"summary\".";

pub const TECHNICAL_SYSTEM_PROMPT: &str = "You are a manufacturing engineer reviewing an industrial design. Respond with a single JSON object with the fields \"feasibilityScore\" (1-10), \"manufacturingProcess\" (array), \"materialChallenges\" (array), \"estimatedUnitCost\", \"timeline\" and \"summary\".";

pub const RISK_SYSTEM_PROMPT: &str = "You are a product risk consultant. Respond with a single JSON object with the fields \"overallRisk\" (low, medium or high), \"risks\" (array of {\"category\", \"description\", \"mitigation\"}) and \"summary\".";

pub fn market_user_prompt(concept: &DesignConcept) -> String {
    format!(
        "Product: {}\nDesign philosophy: {}\nMaterials: {}\nKey features: {}\n\nAnalyse the market for this product.",
        concept.concept_name,
        concept.design_philosophy,
        concept.materials_joined(" "),
        concept.key_features_joined()
    )
}

pub fn technical_user_prompt(concept: &DesignConcept) -> String {
    format!(
        "Product: {}\nForm factor: {}\nDimensions: {}\nMaterials: {}\nKey features: {}\n\nAssess the technical feasibility of producing this product.",
        concept.concept_name,
        concept.form_factor,
        concept.dimensions,
        concept.materials_joined(" - "),
        concept.key_features_joined()
    )
}

pub fn risk_user_prompt(concept: &DesignConcept) -> String {
    format!(
        "Product: {}\nMaterials: {}\nUser interaction: {}\nKey features: {}\n\nAssess the risks of bringing this product to market.",
        concept.concept_name,
        concept.materials_joined(" "),
        concept.user_interaction,
        concept.key_features_joined()
    )
}

// =============================================================================
// CHAT
// =============================================================================

pub const CHAT_SYSTEM_PROMPT: &str = "You are a knowledgeable assistant for traditional crafts and cultural heritage. Answer using only the reference material provided. If the material does not cover the question, say so plainly. Answer in the language of the question.";

pub fn chat_user_prompt(question: &str, context: &str) -> String {
    format!(
        "Reference material:\n{}\n\nQuestion:\n{}\n",
        context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftgen_core::{ColorSwatch, Material};

    fn turn(role: &str, content: &str) -> ConversationTurn {
        ConversationTurn::new(role, content)
    }

    fn concept() -> DesignConcept {
        DesignConcept {
            concept_name: "Lantern Cup".to_string(),
            design_philosophy: "Light through paper".to_string(),
            cultural_context: "Lantern festival".to_string(),
            form_factor: "Cylindrical cup".to_string(),
            dimensions: "8 x 8 x 10 cm".to_string(),
            user_interaction: "Hold with both hands".to_string(),
            materials: vec![Material {
                name: "Porcelain".to_string(),
                finish: "eggshell glaze".to_string(),
            }],
            colors: vec![ColorSwatch {
                name: "Vermilion".to_string(),
                hex: "#E34234".to_string(),
            }],
            key_features: vec!["Translucent walls".to_string()],
        }
    }

    #[test]
    fn test_history_block_empty() {
        assert_eq!(history_block(&[]), "");
        let prompt = concept_user_prompt("tea set", "ctx", &[]);
        assert!(!prompt.contains("[Conversation so far]"));
        assert!(prompt.starts_with("Creative idea:"));
    }

    #[test]
    fn test_history_block_role_tagged_in_order() {
        let block = history_block(&[turn("user", "a tea set"), turn("assistant", "Bamboo Breeze")]);
        assert_eq!(
            block,
            "[Conversation so far]\nUSER: a tea set\nASSISTANT: Bamboo Breeze\n\n[Current request]\n"
        );
    }

    #[test]
    fn test_history_block_skips_incomplete_turns() {
        let orphan = ConversationTurn {
            role: None,
            content: Some("orphan".to_string()),
        };
        let silent = ConversationTurn {
            role: Some("assistant".to_string()),
            content: None,
        };
        let block = history_block(&[orphan.clone(), turn("user", "a kite"), silent.clone()]);
        assert_eq!(block, "[Conversation so far]\nUSER: a kite\n\n[Current request]\n");
        assert_eq!(history_block(&[orphan, silent]), "");
    }

    #[test]
    fn test_concept_system_prompt_is_complete() {
        assert!(CONCEPT_SYSTEM_PROMPT.contains(r##""#RRGGBB""##));
        assert!(CONCEPT_SYSTEM_PROMPT.contains("\"keyFeatures\": [string]"));
        assert!(CONCEPT_SYSTEM_PROMPT.ends_with("\"#RRGGBB\"."));
    }

    #[test]
    fn test_history_precedes_idea() {
        let prompt = concept_user_prompt("make it smaller", "ctx", &[turn("user", "a tea set")]);
        let history_at = prompt.find("USER: a tea set").unwrap();
        let idea_at = prompt.find("make it smaller").unwrap();
        assert!(history_at < idea_at);
    }

    #[test]
    fn test_render_prompt_joins_materials_and_colors() {
        let prompt = render_prompt(&concept());
        assert!(prompt.contains("Porcelain eggshell glaze"));
        assert!(prompt.contains("Color scheme: Vermilion"));
    }

    #[test]
    fn test_technical_prompt_uses_dash_separator() {
        assert!(technical_user_prompt(&concept()).contains("Porcelain - eggshell glaze"));
    }
}
