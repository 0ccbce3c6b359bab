use crate::aggregator::ProjectDocumentSet;
use crate::error::Result;

/// Pretty-printed JSON of the whole set
pub fn render(set: &ProjectDocumentSet) -> Result<String> {
    Ok(serde_json::to_string_pretty(set)?)
}

/// Parses a set previously written by [`render`]
pub fn parse(json: &str) -> Result<ProjectDocumentSet> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fixtures::sample_set;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_shape() {
        let json = render(&sample_set()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["project_name"], "demo");
        assert_eq!(value["mode"]["kind"], "batch");
        assert_eq!(value["results"][0]["status"], "success");
        assert_eq!(value["results"][1]["reason"], "rate_limited");
        assert_eq!(value["results"][2]["cause"], "non_text_content");
        assert_eq!(value["state"]["state"], "completed");
    }

    #[test]
    fn test_json_reads_back() {
        let set = sample_set();
        assert_eq!(parse(&render(&set).unwrap()).unwrap(), set);
    }
}
