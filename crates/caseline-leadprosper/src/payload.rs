// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead payload mapping to the LeadProsper wire format.
//!
//! Internal field names map to vendor names where they differ; any answer
//! not explicitly mapped passes through under its own name, so new
//! practice-area fields reach the vendor without client changes.

use caseline_core::LeadPayload;
use serde_json::{Map, Value};

/// Internal -> vendor field renames. Everything else passes through.
const FIELD_MAP: &[(&str, &str)] = &[
    ("phone", "phone_home"),
    ("description", "case_description"),
    ("date_of_incident", "incident_date"),
];

/// Build the vendor request body from a frozen lead snapshot.
///
/// Phone numbers are canonicalized to bare digits, null/empty values are
/// stripped, and the campaign id is attached when configured.
pub fn build_vendor_payload(lead: &LeadPayload, campaign_id: Option<&str>) -> Map<String, Value> {
    let mut body = Map::new();

    if let Some(campaign) = campaign_id {
        body.insert("lp_campaign_id".to_string(), Value::String(campaign.to_string()));
    }

    for (name, value) in &lead.answers {
        if value.trim().is_empty() {
            continue;
        }
        let vendor_name = FIELD_MAP
            .iter()
            .find(|(internal, _)| internal == name)
            .map(|(_, vendor)| *vendor)
            .unwrap_or(name.as_str());
        let vendor_value = if name == "phone" {
            canonical_phone(value)
        } else {
            value.clone()
        };
        body.insert(vendor_name.to_string(), Value::String(vendor_value));
    }

    insert_non_empty(&mut body, "category", &lead.main_category);
    if let Some(sub) = &lead.sub_category {
        insert_non_empty(&mut body, "case_type", sub);
    }
    insert_non_empty(&mut body, "ip_address", &lead.ip);
    insert_non_empty(&mut body, "user_agent", &lead.user_agent);
    if let Some(cert) = &lead.trusted_form_cert_url {
        insert_non_empty(&mut body, "trusted_form_cert_url", cert);
    }
    insert_non_empty(&mut body, "submitted_at", &lead.submitted_at);

    body
}

fn insert_non_empty(body: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.trim().is_empty() {
        body.insert(key.to_string(), Value::String(value.to_string()));
    }
}

/// Vendor phone format: bare digits, no formatting.
fn canonical_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}
