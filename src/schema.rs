//! Schema Registry
//!
//! Column names shared by every stage and the declared column sets the
//! validator checks raw input and `model_input` against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const CREATED_DATE: &str = "created_date";
pub const CITY_MAPPED: &str = "city_mapped";
pub const CITY_TIER: &str = "city_tier";
pub const FIRST_PLATFORM: &str = "first_platform_c";
pub const FIRST_UTM_MEDIUM: &str = "first_utm_medium_c";
pub const FIRST_UTM_SOURCE: &str = "first_utm_source_c";
pub const TOTAL_LEADS_DROPPED: &str = "total_leads_droppped";
pub const REFERRED_LEAD: &str = "referred_lead";
pub const APP_COMPLETE_FLAG: &str = "app_complete_flag";

pub const INTERACTION_TYPE: &str = "interaction_type";
pub const INTERACTION_VALUE: &str = "interaction_value";
pub const INTERACTION_MAPPING: &str = "interaction_mapping";

/// Level every insignificant categorical value collapses to
pub const OTHERS_LEVEL: &str = "others";

/// Tier assigned to cities missing from the tier mapping
pub const DEFAULT_CITY_TIER: f64 = 3.0;

/// Columns null-filled with 0 on load
pub const NULL_FILLED_COLUMNS: [&str; 2] = [TOTAL_LEADS_DROPPED, REFERRED_LEAD];

/// The categorical fields collapsed to their significant levels
pub const CATEGORICAL_FIELDS: [&str; 3] = [FIRST_PLATFORM, FIRST_UTM_MEDIUM, FIRST_UTM_SOURCE];

/// Columns never treated as interaction indicators when unpivoting
pub const NON_INTERACTION_COLUMNS: [&str; 8] = [
    CREATED_DATE,
    FIRST_PLATFORM,
    FIRST_UTM_MEDIUM,
    FIRST_UTM_SOURCE,
    TOTAL_LEADS_DROPPED,
    CITY_TIER,
    REFERRED_LEAD,
    APP_COMPLETE_FLAG,
];

/// Raw interaction-indicator columns tracked by the lead source
pub const RAW_INTERACTION_COLUMNS: [&str; 36] = [
    "1_on_1_industry_mentorship",
    "call_us_button_clicked",
    "career_coach",
    "career_impact",
    "careers",
    "chat_clicked",
    "companies",
    "download_button_clicked",
    "download_syllabus",
    "emi_partner_click",
    "emi_plans_clicked",
    "fee_component_click",
    "hiring_partners",
    "homepage_upgrad_support_number_clicked",
    "industry_projects_case_studies",
    "live_chat_button_clicked",
    "payment_amount_toggle_mover",
    "placement_support",
    "placement_support_banner_tab_clicked",
    "program_structure",
    "programme_curriculum",
    "programme_faculty",
    "request_callback_on_instant_customer_support_cta_clicked",
    "shorts_entry_click",
    "social_referral_click",
    "specialisation_tab_clicked",
    "specializations",
    "specilization_click",
    "syllabus",
    "syllabus_expand",
    "syllabus_submodule_expand",
    "tab_career_assistance",
    "tab_job_opportunities",
    "tab_student_support",
    "view_programs_page",
    "whatsapp_chat_click",
];

/// Canonical interaction names `model_input` carries one column for
pub const MODEL_INTERACTION_FEATURES: [&str; 5] = [
    "assistance_interaction",
    "career_interaction",
    "payment_interaction",
    "social_interaction",
    "syllabus_interaction",
];

/// Training emits the label as part of the pivot index; inference data has no label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    #[default]
    Training,
    Inference,
}

impl PipelineMode {
    /// Pivot index columns, in output order
    pub fn index_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![
            CREATED_DATE,
            CITY_TIER,
            FIRST_PLATFORM,
            FIRST_UTM_MEDIUM,
            FIRST_UTM_SOURCE,
            TOTAL_LEADS_DROPPED,
            REFERRED_LEAD,
        ];
        if self.has_label() {
            columns.push(APP_COMPLETE_FLAG);
        }
        columns
    }

    pub fn has_label(&self) -> bool {
        matches!(self, PipelineMode::Training)
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMode::Training => write!(f, "training"),
            PipelineMode::Inference => write!(f, "inference"),
        }
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "training" | "train" => Ok(PipelineMode::Training),
            "inference" | "infer" => Ok(PipelineMode::Inference),
            other => Err(format!("unknown pipeline mode '{}'", other)),
        }
    }
}

/// A named, declared set of columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    pub columns: Vec<String>,
}

impl SchemaEntry {
    pub fn new(name: impl Into<String>, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn column_set(&self) -> BTreeSet<String> {
        self.columns.iter().cloned().collect()
    }
}

/// Static declarations of the raw-input and model-input column sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    pub raw_data: SchemaEntry,
    pub model_input: SchemaEntry,
}

impl SchemaRegistry {
    /// Registry for the given mode; inference drops the label from both entries.
    pub fn for_mode(mode: PipelineMode, interaction_features: &[String]) -> Self {
        let mut raw = vec![
            CREATED_DATE,
            CITY_MAPPED,
            FIRST_PLATFORM,
            FIRST_UTM_MEDIUM,
            FIRST_UTM_SOURCE,
            TOTAL_LEADS_DROPPED,
            REFERRED_LEAD,
        ];
        if mode.has_label() {
            raw.push(APP_COMPLETE_FLAG);
        }
        raw.extend(RAW_INTERACTION_COLUMNS);

        let mut model_input: Vec<String> =
            mode.index_columns().into_iter().map(String::from).collect();
        model_input.extend(interaction_features.iter().cloned());

        Self {
            raw_data: SchemaEntry::new("raw_data", raw),
            model_input: SchemaEntry::new("model_input", model_input),
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let features: Vec<String> = MODEL_INTERACTION_FEATURES.iter().map(|s| s.to_string()).collect();
        Self::for_mode(PipelineMode::Training, &features)
    }
}
