use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::Api;
use crate::buildpack::{BuildpackDescriptor, OrderEntry};
use crate::stack::Stack;

/// Image label under which a builder or buildpackage records its embedded
/// buildpack layers, so the image can be introspected without unpacking them.
pub const BUILDPACK_LAYERS_LABEL: &str = "io.buildpacks.buildpack.layers";

/// The `io.buildpacks.buildpack.layers` label payload: buildpack ID to
/// version to the metadata of the layer holding that buildpack.
pub type BuildpackLayers = BTreeMap<String, BTreeMap<String, BuildpackLayerInfo>>;

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
pub struct BuildpackLayerInfo {
    pub api: Api,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacks: Vec<Stack>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<OrderEntry>,
    #[serde(rename = "layerDiffID")]
    pub layer_diff_id: String,
}

/// Records the layer holding the given buildpack, keyed by its ID and version.
pub fn put_buildpack_layer(
    layers: &mut BuildpackLayers,
    descriptor: &BuildpackDescriptor,
    diff_id: impl Into<String>,
) {
    layers
        .entry(descriptor.info.id.clone())
        .or_default()
        .insert(
            descriptor.info.version.clone(),
            BuildpackLayerInfo {
                api: descriptor.api,
                stacks: descriptor.stacks.clone(),
                order: descriptor.order.clone(),
                layer_diff_id: diff_id.into(),
            },
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildpack::BuildpackInfo;

    #[test]
    fn serialize_layers_label() {
        let mut layers = BuildpackLayers::new();
        put_buildpack_layer(
            &mut layers,
            &BuildpackDescriptor {
                api: Api::new(0, 2),
                info: BuildpackInfo::new("bp.1.id", "bp.1.version"),
                stacks: vec![Stack::with_mixins("stack.id.1", [String::from("Mixin-A")])],
                order: Vec::new(),
            },
            "sha256:deadbeef",
        );

        assert_eq!(
            serde_json::to_value(&layers).unwrap(),
            serde_json::json!({
                "bp.1.id": {
                    "bp.1.version": {
                        "api": "0.2",
                        "stacks": [{"id": "stack.id.1", "mixins": ["Mixin-A"]}],
                        "layerDiffID": "sha256:deadbeef"
                    }
                }
            })
        );
    }

    #[test]
    fn deserialize_layers_label() {
        let layers: BuildpackLayers = serde_json::from_str(
            r#"{
                "bp.1.id": {
                    "bp.1.version": {
                        "api": "0.2",
                        "order": [{"group": [{"id": "dep", "version": "1.0.0"}]}],
                        "layerDiffID": "sha256:cafe"
                    }
                }
            }"#,
        )
        .unwrap();

        let info = &layers["bp.1.id"]["bp.1.version"];
        assert_eq!(info.api, Api::new(0, 2));
        assert!(info.stacks.is_empty());
        assert_eq!(info.order.len(), 1);
        assert_eq!(info.layer_diff_id, "sha256:cafe");
    }

    #[test]
    fn put_keeps_other_versions_of_same_buildpack() {
        let mut layers = BuildpackLayers::new();
        for version in ["1.0.0", "2.0.0"] {
            put_buildpack_layer(
                &mut layers,
                &BuildpackDescriptor {
                    api: Api::new(0, 2),
                    info: BuildpackInfo::new("bp.1.id", version),
                    stacks: vec![Stack::new("stack.id.1")],
                    order: Vec::new(),
                },
                "sha256:0000",
            );
        }

        assert_eq!(layers["bp.1.id"].len(), 2);
    }
}
