//! The batch walk, separated from command recording.
//!
//! Planning is pure: it consumes only scene-graph data and produces the
//! exact sequence of pipeline switches, binding commits, constant uploads
//! and draw calls the renderer will record. That keeps the state-change
//! minimization testable without a GPU and lets the renderer size its
//! constant arenas before recording begins.

use glam::Mat4;

use crate::renderer::{AlphaModeFlags, PipelineKey, RenderParams};
use crate::scene::{AlphaMode, Material, Mesh, Node};

/// Passes run in fixed order so blended primitives composite against the
/// opaque and masked geometry already in the target. No depth sorting
/// within the Blend pass; primitives draw in scene traversal order.
const PASS_ORDER: [(AlphaMode, AlphaModeFlags); 3] = [
    (AlphaMode::Opaque, AlphaModeFlags::OPAQUE),
    (AlphaMode::Mask, AlphaModeFlags::MASK),
    (AlphaMode::Blend, AlphaModeFlags::BLEND),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrawCall {
    Indexed {
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
    NonIndexed {
        vertex_count: u32,
        start_vertex: u32,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PlannedDraw {
    /// `Some` when the pipeline key differs from the previous draw.
    pub set_pipeline: Option<PipelineKey>,
    /// `Some(material index)` when the resource binding must be
    /// (re-)committed before this draw.
    pub commit_binding: Option<u32>,
    pub material_index: u32,
    pub node_matrix: Mat4,
    /// Joint count after clamping to the configured maximum.
    pub joint_count: u32,
    /// Mesh index whose joint palette must be uploaded before this draw;
    /// `None` when the previous upload is still valid.
    pub upload_joints: Option<usize>,
    pub call: DrawCall,
}

#[derive(Debug, Default)]
pub(crate) struct DrawPlan {
    pub draws: Vec<PlannedDraw>,
    pub joint_uploads: u32,
    pub pipeline_binds: u32,
    pub binding_commits: u32,
}

/// Which binding source the render call was given.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BindingMode {
    /// Per-material bindings; the count must match the material list.
    PerMaterial { count: usize },
    /// One shared resource-cache binding for every primitive.
    Shared,
}

pub(crate) fn build_draw_plan(
    materials: &[Material],
    meshes: &[Mesh],
    nodes: &[Node],
    base_vertex: i32,
    first_index: u32,
    params: &RenderParams,
    mode: BindingMode,
    max_joint_count: u32,
) -> DrawPlan {
    if let BindingMode::PerMaterial { count } = mode {
        assert_eq!(
            count,
            materials.len(),
            "The number of material bindings is not consistent with the number of materials"
        );
    }

    let mut plan = DrawPlan::default();
    let mut current_key: Option<PipelineKey> = None;
    let mut current_binding: Option<u32> = None;
    let mut last_joints_mesh: Option<usize> = None;

    for (pass_mode, pass_flag) in PASS_ORDER {
        if !params.alpha_modes.contains(pass_flag) {
            continue;
        }

        for node in nodes {
            let Some(mesh_index) = node.mesh else {
                continue;
            };
            let mesh = &meshes[mesh_index];

            for primitive in &mesh.primitives {
                let material_index = primitive.material_index;
                assert!(
                    (material_index as usize) < materials.len(),
                    "Material index is out of bounds. This most likely indicates that \
                     resource bindings were initialized for a different model"
                );
                let material = &materials[material_index as usize];
                if material.alpha_mode != pass_mode {
                    continue;
                }

                let key = PipelineKey {
                    alpha_mode: pass_mode,
                    double_sided: material.double_sided,
                };
                let set_pipeline = if current_key != Some(key) {
                    current_key = Some(key);
                    plan.pipeline_binds += 1;
                    // A fresh pipeline bind invalidates the committed
                    // binding even if the object is unchanged.
                    current_binding = None;
                    Some(key)
                } else {
                    None
                };

                let binding_id = match mode {
                    BindingMode::PerMaterial { .. } => material_index,
                    BindingMode::Shared => 0,
                };
                let commit_binding = if current_binding != Some(binding_id) {
                    current_binding = Some(binding_id);
                    plan.binding_commits += 1;
                    Some(binding_id)
                } else {
                    None
                };

                let mut joint_count = mesh.transforms.joint_matrices.len() as u32;
                if joint_count > max_joint_count {
                    log::warn!(
                        "The number of joints in the mesh ({}) exceeds the maximum ({}) \
                         reserved in the buffer. Increase max_joint_count when initializing \
                         the renderer.",
                        joint_count,
                        max_joint_count
                    );
                    joint_count = max_joint_count;
                }

                let upload_joints = if joint_count != 0 && last_joints_mesh != Some(mesh_index) {
                    last_joints_mesh = Some(mesh_index);
                    plan.joint_uploads += 1;
                    Some(mesh_index)
                } else {
                    None
                };

                let call = if primitive.has_indices() {
                    DrawCall::Indexed {
                        index_count: primitive.index_count,
                        first_index: first_index + primitive.first_index,
                        base_vertex,
                    }
                } else {
                    DrawCall::NonIndexed {
                        vertex_count: primitive.vertex_count,
                        start_vertex: base_vertex as u32,
                    }
                };

                plan.draws.push(PlannedDraw {
                    set_pipeline,
                    commit_binding,
                    material_index,
                    node_matrix: params.model_transform * mesh.transforms.matrix,
                    joint_count,
                    upload_joints,
                    call,
                });
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RenderParams;
    use crate::scene::{MeshTransforms, Primitive};

    fn material(alpha_mode: AlphaMode, double_sided: bool) -> Material {
        Material::new()
            .with_alpha_mode(alpha_mode, 0.5)
            .with_double_sided(double_sided)
    }

    fn primitive(material_index: u32, first_index: u32, index_count: u32) -> Primitive {
        Primitive {
            material_index,
            first_index,
            index_count,
            vertex_count: 0,
        }
    }

    fn single_mesh_scene(primitives: Vec<Primitive>, joints: usize) -> (Vec<Mesh>, Vec<Node>) {
        let mesh = Mesh {
            primitives,
            transforms: MeshTransforms {
                matrix: Mat4::IDENTITY,
                joint_matrices: vec![Mat4::IDENTITY; joints],
            },
        };
        (vec![mesh], vec![Node { mesh: Some(0) }])
    }

    fn plan(
        materials: &[Material],
        meshes: &[Mesh],
        nodes: &[Node],
        params: &RenderParams,
    ) -> DrawPlan {
        build_draw_plan(
            materials,
            meshes,
            nodes,
            0,
            0,
            params,
            BindingMode::PerMaterial {
                count: materials.len(),
            },
            64,
        )
    }

    #[test]
    fn single_opaque_primitive_needs_one_of_everything() {
        let materials = vec![material(AlphaMode::Opaque, false)];
        let (meshes, nodes) = single_mesh_scene(vec![primitive(0, 0, 36)], 0);
        let plan = plan(&materials, &meshes, &nodes, &RenderParams::default());

        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.pipeline_binds, 1);
        assert_eq!(plan.binding_commits, 1);
        assert_eq!(plan.joint_uploads, 0);

        let draw = &plan.draws[0];
        assert_eq!(
            draw.set_pipeline,
            Some(PipelineKey {
                alpha_mode: AlphaMode::Opaque,
                double_sided: false,
            })
        );
        assert_eq!(draw.commit_binding, Some(0));
        assert_eq!(draw.joint_count, 0);
        assert_eq!(draw.upload_joints, None);
        assert_eq!(
            draw.call,
            DrawCall::Indexed {
                index_count: 36,
                first_index: 0,
                base_vertex: 0,
            }
        );
    }

    #[test]
    fn consecutive_primitives_with_same_key_share_one_pipeline_bind() {
        let materials = vec![material(AlphaMode::Opaque, false)];
        let (meshes, nodes) =
            single_mesh_scene(vec![primitive(0, 0, 6), primitive(0, 6, 6)], 0);
        let plan = plan(&materials, &meshes, &nodes, &RenderParams::default());

        assert_eq!(plan.draws.len(), 2);
        assert_eq!(plan.pipeline_binds, 1);
        assert_eq!(plan.binding_commits, 1);
        assert!(plan.draws[1].set_pipeline.is_none());
        assert!(plan.draws[1].commit_binding.is_none());
    }

    #[test]
    fn pipeline_rebind_forces_binding_recommit() {
        // Same material binding identity is irrelevant here: two materials
        // with different culling state but consecutive use of material 0's
        // binding would still need a recommit after the pipeline changes.
        let materials = vec![
            material(AlphaMode::Opaque, false),
            material(AlphaMode::Opaque, true),
        ];
        let (meshes, nodes) = single_mesh_scene(
            vec![primitive(0, 0, 6), primitive(1, 6, 6), primitive(0, 12, 6)],
            0,
        );
        let plan = plan(&materials, &meshes, &nodes, &RenderParams::default());

        assert_eq!(plan.pipeline_binds, 3);
        assert_eq!(plan.binding_commits, 3);
        assert!(plan.draws[2].set_pipeline.is_some());
        assert_eq!(plan.draws[2].commit_binding, Some(0));
    }

    #[test]
    fn passes_run_in_fixed_alpha_mode_order() {
        let materials = vec![
            material(AlphaMode::Blend, false),
            material(AlphaMode::Opaque, false),
            material(AlphaMode::Mask, false),
        ];
        let (meshes, nodes) = single_mesh_scene(
            vec![primitive(0, 0, 6), primitive(1, 6, 6), primitive(2, 12, 6)],
            0,
        );
        let plan = plan(&materials, &meshes, &nodes, &RenderParams::default());

        let order: Vec<u32> = plan.draws.iter().map(|d| d.material_index).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn alpha_mode_filter_drops_whole_passes() {
        let materials = vec![
            material(AlphaMode::Opaque, false),
            material(AlphaMode::Blend, false),
        ];
        let (meshes, nodes) =
            single_mesh_scene(vec![primitive(0, 0, 6), primitive(1, 6, 6)], 0);
        let params = RenderParams {
            alpha_modes: AlphaModeFlags::BLEND,
            ..RenderParams::default()
        };
        let plan = plan(&materials, &meshes, &nodes, &params);

        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.draws[0].material_index, 1);
    }

    #[test]
    fn skinned_mesh_uploads_joints_once_per_mesh() {
        let materials = vec![material(AlphaMode::Opaque, false)];
        let (meshes, nodes) =
            single_mesh_scene(vec![primitive(0, 0, 6), primitive(0, 6, 6)], 12);
        let plan = plan(&materials, &meshes, &nodes, &RenderParams::default());

        assert_eq!(plan.joint_uploads, 1);
        assert_eq!(plan.draws[0].upload_joints, Some(0));
        assert_eq!(plan.draws[0].joint_count, 12);
        assert_eq!(plan.draws[1].upload_joints, None);
        assert_eq!(plan.draws[1].joint_count, 12);
    }

    #[test]
    fn excess_joints_are_clamped_not_fatal() {
        let _ = env_logger::builder().is_test(true).try_init();
        let materials = vec![material(AlphaMode::Opaque, false)];
        let (meshes, nodes) = single_mesh_scene(vec![primitive(0, 0, 6)], 100);
        let plan = plan(&materials, &meshes, &nodes, &RenderParams::default());

        assert_eq!(plan.draws[0].joint_count, 64);
        assert_eq!(plan.draws[0].upload_joints, Some(0));
    }

    #[test]
    fn primitive_without_indices_plans_a_vertex_draw() {
        let materials = vec![material(AlphaMode::Opaque, false)];
        let mesh = Mesh {
            primitives: vec![Primitive {
                material_index: 0,
                first_index: 0,
                index_count: 0,
                vertex_count: 24,
            }],
            transforms: MeshTransforms::default(),
        };
        let nodes = vec![Node { mesh: Some(0) }];
        let plan = build_draw_plan(
            &materials,
            &[mesh],
            &nodes,
            100,
            0,
            &RenderParams::default(),
            BindingMode::PerMaterial { count: 1 },
            64,
        );

        assert_eq!(
            plan.draws[0].call,
            DrawCall::NonIndexed {
                vertex_count: 24,
                start_vertex: 100,
            }
        );
    }

    #[test]
    fn buffer_offsets_combine_model_and_primitive_locations() {
        let materials = vec![material(AlphaMode::Opaque, false)];
        let (meshes, nodes) = single_mesh_scene(vec![primitive(0, 60, 30)], 0);
        let plan = build_draw_plan(
            &materials,
            &meshes,
            &nodes,
            -8,
            1000,
            &RenderParams::default(),
            BindingMode::PerMaterial { count: 1 },
            64,
        );

        assert_eq!(
            plan.draws[0].call,
            DrawCall::Indexed {
                index_count: 30,
                first_index: 1060,
                base_vertex: -8,
            }
        );
    }

    #[test]
    fn shared_binding_commits_once_across_materials() {
        let materials = vec![
            material(AlphaMode::Opaque, false),
            material(AlphaMode::Opaque, false),
        ];
        let (meshes, nodes) =
            single_mesh_scene(vec![primitive(0, 0, 6), primitive(1, 6, 6)], 0);
        let plan = build_draw_plan(
            &materials,
            &meshes,
            &nodes,
            0,
            0,
            &RenderParams::default(),
            BindingMode::Shared,
            64,
        );

        assert_eq!(plan.binding_commits, 1);
        assert!(plan.draws[1].commit_binding.is_none());
    }

    #[test]
    #[should_panic(expected = "not consistent with the number of materials")]
    fn binding_count_mismatch_is_a_contract_violation() {
        let materials = vec![material(AlphaMode::Opaque, false)];
        let (meshes, nodes) = single_mesh_scene(vec![primitive(0, 0, 6)], 0);
        build_draw_plan(
            &materials,
            &meshes,
            &nodes,
            0,
            0,
            &RenderParams::default(),
            BindingMode::PerMaterial { count: 2 },
            64,
        );
    }

    #[test]
    #[should_panic(expected = "Material index is out of bounds")]
    fn out_of_range_material_index_is_a_contract_violation() {
        let materials = vec![material(AlphaMode::Opaque, false)];
        let (meshes, nodes) = single_mesh_scene(vec![primitive(5, 0, 6)], 0);
        build_draw_plan(
            &materials,
            &meshes,
            &nodes,
            0,
            0,
            &RenderParams::default(),
            BindingMode::PerMaterial { count: 1 },
            64,
        );
    }
}
