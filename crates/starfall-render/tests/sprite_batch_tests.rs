//! Sprite batch behaviour against the mock device.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use starfall_render::indirect::DrawIndexedIndirect;
use starfall_render::*;
use starfall_test_utils::{
    AttachmentDescription, ClearValue, CommandBuffer, Framebuffer, GpuSampler, GpuTextureView, LoadOp,
    MockFailure, MockRenderContext, RenderCall, RenderCommand, RenderPassInfo, SubpassDescription, Viewport,
};

fn render_pass() -> RenderPassInfo {
    RenderPassInfo {
        attachments: vec![
            AttachmentDescription::color(wgpu::TextureFormat::Bgra8UnormSrgb, LoadOp::Clear),
            AttachmentDescription::depth_stencil(wgpu::TextureFormat::Depth24PlusStencil8, LoadOp::Clear, LoadOp::Clear),
        ],
        subpasses: vec![SubpassDescription {
            color_attachments: vec![0],
            depth_stencil_attachment: Some(1),
        }],
    }
}

fn texture(id: u64) -> SpriteTexture {
    SpriteTexture::new(
        id,
        GpuTextureView::mock(10_000 + id as usize),
        GpuSampler::mock(20_000 + id as usize),
        64,
        32,
    )
}

fn framebuffer() -> Framebuffer {
    Framebuffer {
        attachments: vec![GpuTextureView::mock(30_000), GpuTextureView::mock(30_001)],
        width: 800,
        height: 600,
    }
}

fn effect_with(mock: &Arc<MockRenderContext>, config: &SpriteBatchConfig, pass: RenderPassInfo) -> SpriteBatchEffect {
    SpriteBatchEffect::initialise(
        mock.clone(),
        Arc::new(EmbeddedShaderContent),
        config,
        &FrameInfo::new(800, 600, pass),
    )
    .unwrap()
}

fn effect(mock: &Arc<MockRenderContext>) -> SpriteBatchEffect {
    effect_with(mock, &SpriteBatchConfig::default(), render_pass())
}

fn indirect_command(mock: &MockRenderContext, batch: &SpriteBatch) -> DrawIndexedIndirect {
    let bytes = mock.buffer_contents(batch.indirect_buffer().buffer());
    let offset = batch.indirect_buffer().offset() as usize;
    bytemuck::pod_read_unaligned(&bytes[offset..offset + std::mem::size_of::<DrawIndexedIndirect>()])
}

#[test]
fn test_indirect_counts_follow_draws() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let batch = effect.batch_mut();

    batch.begin().unwrap();
    for i in 0..5 {
        batch
            .draw(&texture(i % 2), SpriteDraw::at(Vec2::new(i as f32, 0.0)))
            .unwrap();
    }
    batch.end().unwrap();

    let command = indirect_command(&mock, batch);
    assert_eq!(command.index_count, 30);
    assert_eq!(command.instance_count, 5);
    assert_eq!(command.first_index, 0);
    assert_eq!(command.base_vertex, 0);
    assert_eq!(command.first_instance, 0);

    let stats = batch.stats();
    assert_eq!(stats.sprite_count, 5);
    // Every `draw` takes a fresh slot.
    assert_eq!(stats.texture_count, 5);
}

#[test]
fn test_counts_reset_between_frames() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let batch = effect.batch_mut();

    batch.begin().unwrap();
    for _ in 0..4 {
        batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    }
    batch.end().unwrap();

    batch.begin().unwrap();
    batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    batch.end().unwrap();

    let command = indirect_command(&mock, batch);
    assert_eq!(command.index_count, 6);
    assert_eq!(command.instance_count, 1);
}

#[test]
fn test_index_pattern_in_buffer() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let batch = effect.batch_mut();

    batch.begin().unwrap();
    batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    batch.end().unwrap();

    let bytes = mock.buffer_contents(batch.batch_buffer().buffer());
    let region = batch.batch_buffer().layout().indices;
    let indices: Vec<u16> = bytes[region.offset as usize..region.offset as usize + 12 * 2]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(indices, vec![0, 1, 2, 1, 3, 2, 4, 5, 6, 5, 7, 6]);
}

#[test]
fn test_single_sprite_geometry_and_material() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let batch = effect.batch_mut();

    batch.begin().unwrap();
    let slot = batch
        .draw(&texture(7), SpriteDraw::at(Vec2::new(10.0, 20.0)))
        .unwrap();
    batch.end().unwrap();
    assert_eq!(slot, 0);

    let item = batch.renderer().items()[0];
    assert_eq!((item.x, item.y, item.depth), (10.0, 20.0, 0.5));
    assert_eq!((item.origin_x, item.origin_y), (0.0, 0.0));
    assert_eq!((item.sin, item.cos), (0.0, 1.0));
    assert_eq!((item.width, item.height), (64.0, 32.0));

    let bytes = mock.buffer_contents(batch.batch_buffer().buffer());
    let region = batch.batch_buffer().layout().materials;
    let material: SpriteMaterialData =
        bytemuck::pod_read_unaligned(&bytes[region.offset as usize..region.offset as usize + region.stride as usize]);
    assert_eq!(material.texture, 0);
    assert_eq!(material.color, Color::WHITE.to_packed());

    let expected = SpriteBatchRenderer::projection(&Viewport::new(800.0, 600.0))
        * Mat4::from_translation(Vec3::new(10.0, 20.0, 0.5));
    assert!(material.transform().abs_diff_eq(expected, 1e-6));

    // Half-pixel shift towards the top-left.
    let ndc = material.transform().project_point3(Vec3::ZERO);
    assert!((ndc.x - (9.5 / 400.0 - 1.0)).abs() < 1e-5);
    assert!((ndc.y - (1.0 - 19.5 / 300.0)).abs() < 1e-5);
    assert!((ndc.z - 0.5).abs() < 1e-5);
}

#[test]
fn test_draw_before_begin_is_rejected() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let batch = effect.batch_mut();

    assert!(matches!(
        batch.draw(&texture(1), SpriteDraw::default()),
        Err(SpriteBatchError::InvalidOperation(_))
    ));
    assert!(matches!(batch.end(), Err(SpriteBatchError::InvalidOperation(_))));
}

#[test]
fn test_texture_slots_are_not_stale() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let set = effect.batch().page().unwrap().descriptor_set().clone();
    let batch = effect.batch_mut();

    batch.begin().unwrap();
    for id in 0..3 {
        batch.draw(&texture(id), SpriteDraw::default()).unwrap();
    }
    batch.end().unwrap();
    let contents = mock.descriptor_set_contents(&set).unwrap();
    assert!(contents.image(0, 2).is_some());

    batch.begin().unwrap();
    batch.draw(&texture(9), SpriteDraw::default()).unwrap();
    batch.end().unwrap();

    let contents = mock.descriptor_set_contents(&set).unwrap();
    assert_eq!(contents.image(0, 0).unwrap().view.mock_id(), Some(10_009));
    assert!(contents.image(0, 1).is_none());
    assert!(contents.image(0, 2).is_none());
    assert!(contents.buffer(1, 0).is_some());
}

#[test]
fn test_one_descriptor_update_per_end() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let batch = effect.batch_mut();
    mock.clear_calls();

    batch.begin().unwrap();
    batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    batch.draw(&texture(2), SpriteDraw::default()).unwrap();
    batch.end().unwrap();

    assert_eq!(mock.count_descriptor_updates(), 1);
    let calls = mock.calls();
    let writes = calls
        .iter()
        .find_map(|call| match call {
            RenderCall::UpdateDescriptorSets { writes } => Some(writes.clone()),
            _ => None,
        })
        .unwrap();
    // Material buffer, then every texture slot.
    assert_eq!(writes.len(), 2);
    assert_eq!((writes[0].1, writes[0].3), (1, 1));
    assert_eq!((writes[1].1, writes[1].2, writes[1].3), (0, 0, 16));
}

#[test]
fn test_empty_batch_submits_empty_draw() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let batch = effect.batch_mut();

    batch.begin().unwrap();
    batch.end().unwrap();

    let command = indirect_command(&mock, batch);
    assert_eq!(command.index_count, 0);
    assert_eq!(command.instance_count, 0);
}

#[test]
fn test_sprite_capacity() {
    let mock = Arc::new(MockRenderContext::new());
    let config = SpriteBatchConfig::default().with_max_sprites(2);
    let mut effect = effect_with(&mock, &config, render_pass());
    let batch = effect.batch_mut();

    batch.begin().unwrap();
    batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    assert!(matches!(
        batch.draw(&texture(1), SpriteDraw::default()),
        Err(SpriteBatchError::CapacityExceeded {
            resource: CapacityResource::Sprites,
            limit: 2
        })
    ));
    batch.end().unwrap();
    assert_eq!(indirect_command(&mock, batch).instance_count, 2);
}

#[test]
fn test_clear_values_follow_attachment_order() {
    let mock = Arc::new(MockRenderContext::new());
    let pass = RenderPassInfo {
        attachments: vec![
            AttachmentDescription::color(wgpu::TextureFormat::Bgra8Unorm, LoadOp::Load),
            AttachmentDescription::depth_stencil(wgpu::TextureFormat::Depth32Float, LoadOp::Clear, LoadOp::DontCare),
            AttachmentDescription::color(wgpu::TextureFormat::Rgba8Unorm, LoadOp::Clear),
        ],
        subpasses: vec![SubpassDescription {
            color_attachments: vec![0, 2],
            depth_stencil_attachment: Some(1),
        }],
    };
    let config = SpriteBatchConfig::default()
        .with_clear_color(Color::BLACK)
        .with_clear_depth_stencil(1.0, 0);
    let effect = effect_with(&mock, &config, pass);

    assert_eq!(
        effect.batch().page().unwrap().clear_values(),
        &[
            ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
            ClearValue::Color([0.0, 0.0, 0.0, 1.0]),
        ]
    );
}

#[test]
fn test_compile_records_draw() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);
    let batch = effect.batch_mut();
    batch.begin().unwrap();
    batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    batch.end().unwrap();

    let mut commands = CommandBuffer::new(Some("sprites"));
    effect.batch().compile(&mut commands, &framebuffer()).unwrap();

    let recorded = commands.commands();
    assert_eq!(recorded.len(), 7);
    assert!(matches!(recorded[0], RenderCommand::BeginRenderPass { .. }));
    assert!(matches!(recorded[1], RenderCommand::BindDescriptorSet { index: 0, .. }));
    assert!(matches!(recorded[2], RenderCommand::BindPipeline(_)));
    assert!(matches!(
        recorded[3],
        RenderCommand::BindIndexBuffer {
            offset: 0,
            format: wgpu::IndexFormat::Uint16,
            ..
        }
    ));
    match &recorded[4] {
        RenderCommand::BindVertexBuffers { first_binding, buffers } => {
            let layout = effect.batch().batch_buffer().layout();
            assert_eq!(*first_binding, 0);
            assert_eq!(buffers.len(), 2);
            assert_eq!(buffers[0].1, layout.vertices.offset);
            assert_eq!(buffers[1].1, layout.instances.offset);
        }
        other => panic!("unexpected command {:?}", other),
    }
    assert!(matches!(
        recorded[5],
        RenderCommand::DrawIndexedIndirect {
            draw_count: 1,
            stride: 20,
            ..
        }
    ));
    assert!(matches!(recorded[6], RenderCommand::EndRenderPass));
}

#[test]
fn test_compile_without_page() {
    let mock = Arc::new(MockRenderContext::new());
    let mut batch = SpriteBatch::new(mock.clone(), &SpriteBatchConfig::default()).unwrap();

    batch.begin().unwrap();
    batch.draw(&texture(1), SpriteDraw::default()).unwrap();
    batch.end().unwrap();

    let mut commands = CommandBuffer::new(None);
    assert_eq!(
        batch.compile(&mut commands, &framebuffer()),
        Err(SpriteBatchError::MissingRenderPage)
    );
    assert!(commands.is_empty());
}

#[test]
fn test_missing_shader_aborts_initialise() {
    let mock = Arc::new(MockRenderContext::new());
    let result = SpriteBatchEffect::initialise(
        mock.clone(),
        Arc::new(ShaderContentMap::new()),
        &SpriteBatchConfig::default(),
        &FrameInfo::new(800, 600, render_pass()),
    );

    assert!(matches!(
        result,
        Err(SpriteBatchError::ShaderContent(ShaderContentError::NotFound(AssetId::SPRITE_VERTEX)))
    ));
    assert_eq!(mock.count_render_pipeline_creates(), 0);
    assert_eq!(mock.count_descriptor_pool_destroys(), 1);
    assert_eq!(mock.count_bind_group_layout_destroys(), 1);
    assert_eq!(mock.count_pipeline_layout_destroys(), 1);
}

#[test]
fn test_pipeline_failure_aborts_initialise() {
    let mock = Arc::new(MockRenderContext::new());
    mock.fail_next(MockFailure::CreateRenderPipeline);
    let result = SpriteBatchEffect::initialise(
        mock.clone(),
        Arc::new(EmbeddedShaderContent),
        &SpriteBatchConfig::default(),
        &FrameInfo::new(800, 600, render_pass()),
    );

    assert!(matches!(result, Err(SpriteBatchError::Device(_))));
    assert_eq!(mock.count_shader_creates(), mock.count_shader_destroys());
    assert_eq!(mock.count_buffer_creates(), 0);
}

#[test]
fn test_destroy_releases_everything_once() {
    let mock = Arc::new(MockRenderContext::new());
    let mut effect = effect(&mock);

    effect.destroy();
    effect.destroy();
    drop(effect);

    assert_eq!(mock.count_render_pipeline_destroys(), 1);
    assert_eq!(mock.count_descriptor_pool_destroys(), 1);
    assert_eq!(mock.count_bind_group_layout_destroys(), 1);
    assert_eq!(mock.count_pipeline_layout_destroys(), 1);
    // Batch buffer and indirect buffer.
    assert_eq!(mock.count_buffer_destroys(), 2);
}

#[test]
fn test_texture_slots_above_device_limit() {
    let mock = Arc::new(MockRenderContext::new());
    let result = SpriteBatchEffect::initialise(
        mock.clone(),
        Arc::new(EmbeddedShaderContent),
        &SpriteBatchConfig::default().with_texture_slots(100),
        &FrameInfo::new(800, 600, render_pass()),
    );

    assert!(matches!(
        result,
        Err(SpriteBatchError::CapacityExceeded {
            resource: CapacityResource::TextureSlots,
            ..
        })
    ));
    assert_eq!(mock.count_bind_group_layout_creates(), 0);
}

#[test]
fn test_oversized_sprite_capacity_is_rejected() {
    let mock = Arc::new(MockRenderContext::new());
    let config = SpriteBatchConfig::default()
        .with_max_sprites(u32::MAX / 4)
        .with_index_format(wgpu::IndexFormat::Uint32);

    let result = SpriteBatch::new(mock.clone(), &config);
    assert!(matches!(result, Err(SpriteBatchError::InvalidConfig(_))));
    // Only the indirect buffer was created, and it is released again.
    assert_eq!(mock.count_buffer_creates(), 1);
    assert_eq!(mock.count_buffer_destroys(), 1);
}

#[test]
fn test_failed_end_commits_nothing() {
    let mock = Arc::new(MockRenderContext::new());
    // The set only has two slots while the batch accepts sixteen textures.
    let configuration = SpriteEffectConfiguration::new(mock.clone(), Arc::new(EmbeddedShaderContent), 2).unwrap();
    let pool = configuration.create_descriptor_pool(1).unwrap();
    let variants = configuration
        .load(&mut [EffectVariantSeed::new(render_pass())])
        .unwrap();
    let mut batch = SpriteBatch::new(mock.clone(), &SpriteBatchConfig::default()).unwrap();
    batch
        .bind(
            &variants[0],
            pool.create_descriptor_set().unwrap(),
            &FrameInfo::new(800, 600, render_pass()),
        )
        .unwrap();

    batch.begin().unwrap();
    for id in 0..3 {
        batch.draw(&texture(id), SpriteDraw::default()).unwrap();
    }
    assert!(matches!(
        batch.end(),
        Err(SpriteBatchError::CapacityExceeded {
            resource: CapacityResource::TextureSlots,
            limit: 2,
        })
    ));
    assert_eq!(mock.count_descriptor_updates(), 0);

    batch.begin().unwrap();
    batch.draw(&texture(7), SpriteDraw::default()).unwrap();
    batch.end().unwrap();
    assert_eq!(mock.count_descriptor_updates(), 1);
}
