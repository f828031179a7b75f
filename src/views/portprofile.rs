//! Port-profile views: `{id, name}` for index, every visible attribute for detail.

use crate::attributes::AttributeMap;
use crate::plugin::PortProfile;
use crate::views::ResourceView;
use serde_json::{json, Value};

pub struct PortProfileView<'a> {
    attr_info: &'a AttributeMap,
}

impl<'a> PortProfileView<'a> {
    pub fn new(attr_info: &'a AttributeMap) -> Self {
        PortProfileView { attr_info }
    }

    pub fn build(&self, profile: &PortProfile, is_detail: bool) -> Value {
        if is_detail {
            self.detail(profile)
        } else {
            json!({ "id": profile.id, "name": profile.name })
        }
    }

    fn detail(&self, profile: &PortProfile) -> Value {
        let mut record = match serde_json::to_value(profile) {
            Ok(Value::Object(m)) => m,
            _ => return json!({ "id": profile.id, "name": profile.name }),
        };
        if profile.assignment.is_empty() {
            record.remove("assignment");
        }
        ResourceView::new(self.attr_info).build(&record)
    }
}
