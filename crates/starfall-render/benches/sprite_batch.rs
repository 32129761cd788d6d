//! Benchmarks for sprite batch accumulation and upload

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::Vec2;
use starfall_render::{
    Color, EmbeddedShaderContent, FrameInfo, SpriteBatchConfig, SpriteBatchEffect, SpriteBatchRenderer, SpriteDraw,
    SpriteTexture,
};
use starfall_test_utils::{
    AttachmentDescription, GpuSampler, GpuTextureView, LoadOp, MockRenderContext, RenderPassInfo,
    SubpassDescription, Viewport,
};

fn render_pass() -> RenderPassInfo {
    RenderPassInfo {
        attachments: vec![AttachmentDescription::color(wgpu::TextureFormat::Bgra8Unorm, LoadOp::Clear)],
        subpasses: vec![SubpassDescription {
            color_attachments: vec![0],
            depth_stencil_attachment: None,
        }],
    }
}

fn textures(count: u32) -> Vec<SpriteTexture> {
    (0..count)
        .map(|i| SpriteTexture::new(i as u64, GpuTextureView::mock(i as usize), GpuSampler::mock(i as usize), 32, 32))
        .collect()
}

fn draw(i: u32) -> SpriteDraw {
    SpriteDraw::at(Vec2::new((i % 40) as f32 * 20.0, (i / 40) as f32 * 20.0))
        .rotation(i as f32 * 0.1)
        .origin(Vec2::splat(16.0))
        .color(Color::CORNFLOWER_BLUE)
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("sprite_accumulate");

    for count in [50u32, 500, 5000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let textures = textures(1);
            let texture = &textures[0];
            let mut renderer = SpriteBatchRenderer::new(count, 1);
            renderer.set_viewport(&Viewport::new(1280.0, 720.0));
            b.iter(|| {
                renderer.begin().unwrap();
                renderer.draw(texture, draw(0)).unwrap();
                for i in 1..count {
                    renderer.draw_slot(0, draw(i)).unwrap();
                }
                renderer.end().unwrap();
                black_box(renderer.command());
            });
        });
    }

    group.finish();
}

fn bench_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("sprite_batch_end");

    for count in [50u32, 1000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mock = Arc::new(MockRenderContext::new());
            let config = SpriteBatchConfig::default().with_max_sprites(count).with_texture_slots(16);
            let mut effect = SpriteBatchEffect::initialise(
                mock.clone(),
                Arc::new(EmbeddedShaderContent),
                &config,
                &FrameInfo::new(1280, 720, render_pass()),
            )
            .unwrap();
            let textures = textures(16);

            b.iter(|| {
                let batch = effect.batch_mut();
                batch.begin().unwrap();
                for texture in &textures {
                    batch.draw(texture, draw(0)).unwrap();
                }
                for i in textures.len() as u32..count {
                    batch.draw_slot(i % 16, draw(i)).unwrap();
                }
                batch.end().unwrap();
                mock.clear_calls();
                black_box(batch.stats())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_end);
criterion_main!(benches);
