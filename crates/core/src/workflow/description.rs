//! Identification block embedded in ticket descriptions.
//!
//! Trackers have no field for the finding and team a ticket belongs to, so
//! both are written into the description between marker lines and searched
//! for when deciding whether a ticket already exists.

const BEGIN_MARK: &str = "======= BEGINNING OF THE CONTENT AUTOMATICALLY INSERTED ======\n";
const DONT_REMOVE_MARK: &str = "======= PLEASE, DON'T REMOVE THE TEXT BETWEEN THESE MARKS =====\n";
const END_MARK: &str = "======= END OF THE CONTENT AUTOMATICALLY INSERTED ============\n";

/// Text identifying the ticket of a finding in a team.
pub fn identification_text(finding_id: &str, team_id: &str) -> String {
    format!("FindingID: {finding_id}\nTeamID: {team_id}")
}

/// Original description followed by the marked identification block.
pub fn description_with_marker(description: &str, finding_id: &str, team_id: &str) -> String {
    format!(
        "\n{description}\n\n{BEGIN_MARK}{DONT_REMOVE_MARK}{}\n{END_MARK}",
        identification_text(finding_id, team_id)
    )
}
