//! Coding systems and codes used in wound documentation.

pub const LOINC_SYSTEM: &str = "http://loinc.org";
pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";
pub const CONDITION_CLINICAL_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/condition-clinical";

/// LOINC panel code for a wound assessment.
pub const WOUND_ASSESSMENT_PANEL: (&str, &str) = ("72300-6", "Wound assessment panel");

pub const WOUND_LENGTH: (&str, &str) = ("401238003", "Length of wound");
pub const WOUND_WIDTH: (&str, &str) = ("401239006", "Width of wound");

pub const PRESSURE_ULCER: (&str, &str) = ("399912005", "Pressure ulcer");
pub const PRESSURE_ULCER_STAGE_1: (&str, &str) = ("420324007", "Pressure ulcer stage 1");
pub const PRESSURE_ULCER_STAGE_2: (&str, &str) = ("421076008", "Pressure ulcer stage 2");
pub const PRESSURE_ULCER_STAGE_3: (&str, &str) = ("420555000", "Pressure ulcer stage 3");
pub const PRESSURE_ULCER_STAGE_4: (&str, &str) = ("421306004", "Pressure ulcer stage 4");

pub const CLINICAL_STATUS_ACTIVE: &str = "active";
