//! Prompt templates for Puls.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for grounded answer generation.
///
/// Available variables: `{{today}}`, `{{question}}`, `{{context}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub system: String,
    pub user: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"Tu es un assistant spécialisé dans les recommandations d'événements culturels.
Nous sommes le {{today}}.

Règles :
- Base ta réponse UNIQUEMENT sur les événements fournis dans le contexte. N'invente aucun événement, lieu, date ou lien.
- Un champ marqué "non disponible" est inconnu : ne le complète pas.
- Si la question mentionne une année ou une période ("cette semaine", "ce week-end", "à venir", "prochainement"), ne retiens que les événements qui la respectent par rapport à la date du jour.
- Si aucun événement du contexte ne correspond, dis-le poliment.
- Présente les événements par date croissante.

Format de réponse : un tableau Markdown avec les colonnes
| Événement | Date | Lieu | Catégorie | Lien |
suivi d'une phrase de synthèse."#
                .to_string(),

            user: r#"Événements trouvés dans la base :

{{context}}

Question de l'utilisateur : {{question}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        // One pass over the template: substituted values are never rescanned.
        let placeholder = Regex::new(r"\{\{(\w+)\}\}").expect("Invalid regex");
        placeholder
            .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
