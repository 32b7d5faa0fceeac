use serde::{Deserialize, Serialize};

/// Body of a workflow API query. Every name field carries the same
/// `ERWaitTimes_<LOCATION>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub app_name: String,
    pub feature_name: String,
    pub meta_vars: MetaVars,
    pub query_vars: QueryVars,
    pub query_name: String,
}

/// Always sent as explicit nulls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaVars {
    pub service_id: Option<String>,
    pub save_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVars {
    pub service: String,
    pub activity: String,
}

impl WorkflowRequest {
    pub fn for_location(location: &str) -> Self {
        let name = format!("ERWaitTimes_{location}");
        Self {
            app_name: name.clone(),
            feature_name: name.clone(),
            meta_vars: MetaVars::default(),
            query_vars: QueryVars {
                service: name.clone(),
                activity: name.clone(),
            },
            query_name: name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_wire_shape() {
        let body = serde_json::to_value(WorkflowRequest::for_location("QEH")).unwrap();
        assert_eq!(
            body,
            json!({
                "appName": "ERWaitTimes_QEH",
                "featureName": "ERWaitTimes_QEH",
                "metaVars": {"service_id": null, "save_location": null},
                "queryVars": {"service": "ERWaitTimes_QEH", "activity": "ERWaitTimes_QEH"},
                "queryName": "ERWaitTimes_QEH"
            })
        );
    }
}
