//! Framebuffer tests
//!
//! Tests for:
//! - G-buffer, lighting and water target creation
//! - Completeness rules and incomplete-framebuffer errors
//! - Cleanup of partially built sets and failed resizes
//! - Resize recreation and viewport target mapping

use glam::UVec2;
use strata::errors::StrataError;
use strata::renderer::backend::{AttachmentInfo, FramebufferStatus, PixelFormat, check_framebuffer};
use strata::renderer::{FramebufferSet, TextureStore};
use strata::{HeadlessBackend, RenderTarget};

fn attachment(size: UVec2, format: PixelFormat) -> Option<AttachmentInfo> {
    Some(AttachmentInfo {
        size,
        format,
        render_target: true,
    })
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn gbuffer_has_four_colour_attachments_and_depth() {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    let size = UVec2::new(640, 360);

    let set = FramebufferSet::new(&mut backend, &mut textures, size, false).unwrap();
    let g = *set.gbuffer();

    let format = |h| backend.texture_info(textures.get(h).unwrap().id).unwrap().format;
    assert_eq!(format(g.color), PixelFormat::Rgba8);
    assert_eq!(format(g.position), PixelFormat::Rgba16Float);
    assert_eq!(format(g.normal), PixelFormat::Rgba16Float);
    assert_eq!(format(g.depth_preview), PixelFormat::Rgba8);
    assert_eq!(format(g.depth), PixelFormat::Depth32);

    assert_eq!(set.size(), size);
    assert!(set.water().is_none());
    // gbuffer + lighting
    assert_eq!(backend.live_framebuffer_count(), 2);
}

#[test]
fn water_targets_are_optional() {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);

    let set = FramebufferSet::new(&mut backend, &mut textures, UVec2::new(64, 64), true).unwrap();
    let water = set.water().unwrap();
    assert_ne!(water.reflection.framebuffer, water.refraction.framebuffer);
    assert_eq!(backend.live_framebuffer_count(), 4);
}

#[test]
fn zero_size_is_clamped() {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);

    let set = FramebufferSet::new(&mut backend, &mut textures, UVec2::ZERO, false).unwrap();
    assert_eq!(set.size(), UVec2::ONE);
}

// ============================================================================
// Completeness
// ============================================================================

#[test]
fn incomplete_framebuffer_is_reported_and_cleaned_up() {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    backend.fail_next_framebuffer(FramebufferStatus::IncompleteAttachment);

    let err = FramebufferSet::new(&mut backend, &mut textures, UVec2::new(32, 32), false).unwrap_err();
    match err {
        StrataError::FramebufferIncomplete { target, status } => {
            assert_eq!(target, "gbuffer");
            assert_eq!(status, FramebufferStatus::IncompleteAttachment);
        }
        other => panic!("expected FramebufferIncomplete, got {other:?}"),
    }
    // only the four default textures survive
    assert_eq!(textures.len(), 4);
    assert_eq!(backend.live_texture_count(), 4);
    assert_eq!(backend.live_framebuffer_count(), 0);
}

#[test]
fn later_group_failure_releases_earlier_groups() {
    // gbuffer, lighting, water reflection, water refraction
    for (successes, label) in [(1, "lighting"), (2, "water reflection"), (3, "water refraction")] {
        let mut backend = HeadlessBackend::new();
        let mut textures = TextureStore::new(&mut backend);
        backend.fail_framebuffer_after(successes, FramebufferStatus::MissingAttachment);

        let err = FramebufferSet::new(&mut backend, &mut textures, UVec2::new(32, 32), true).unwrap_err();
        assert!(
            matches!(err, StrataError::FramebufferIncomplete { target, .. } if target == label),
            "{label}: {err:?}"
        );
        assert_eq!(textures.len(), 4, "{label}");
        assert_eq!(backend.live_texture_count(), 4, "{label}");
        assert_eq!(backend.live_framebuffer_count(), 0, "{label}");
    }
}

#[test]
fn failed_resize_keeps_the_current_targets() {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    let mut set = FramebufferSet::new(&mut backend, &mut textures, UVec2::new(100, 50), true).unwrap();
    let final_color = set.lighting().final_color;
    let live_textures = backend.live_texture_count();

    backend.fail_framebuffer_after(1, FramebufferStatus::Unsupported);
    assert!(set.resize(&mut backend, &mut textures, UVec2::new(200, 100)).is_err());

    assert_eq!(set.size(), UVec2::new(100, 50));
    assert_eq!(set.lighting().final_color, final_color);
    assert_eq!(textures.get(final_color).unwrap().size, UVec2::new(100, 50));
    assert_eq!(backend.live_texture_count(), live_textures);
    assert_eq!(backend.live_framebuffer_count(), 4);
}

#[test]
fn completeness_rules() {
    let size = UVec2::new(8, 8);
    let color = attachment(size, PixelFormat::Rgba8);
    let depth = attachment(size, PixelFormat::Depth32);

    assert_eq!(check_framebuffer(&[color], Some(depth)), Ok(()));
    assert_eq!(
        check_framebuffer(&[], None),
        Err(FramebufferStatus::MissingAttachment)
    );
    assert_eq!(
        check_framebuffer(&[None], Some(depth)),
        Err(FramebufferStatus::Undefined)
    );
    assert_eq!(
        check_framebuffer(&[depth], None),
        Err(FramebufferStatus::IncompleteAttachment)
    );
    assert_eq!(
        check_framebuffer(&[color, attachment(UVec2::new(4, 8), PixelFormat::Rgba8)], None),
        Err(FramebufferStatus::AttachmentSizeMismatch)
    );

    let sampled_only = Some(AttachmentInfo {
        size,
        format: PixelFormat::Rgba8,
        render_target: false,
    });
    assert_eq!(
        check_framebuffer(&[sampled_only], None),
        Err(FramebufferStatus::IncompleteAttachment)
    );
}

// ============================================================================
// Resize & inspection
// ============================================================================

#[test]
fn resize_recreates_every_target() {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    let mut set = FramebufferSet::new(&mut backend, &mut textures, UVec2::new(100, 50), true).unwrap();
    let old_final = set.lighting().final_color;
    let live_before = backend.live_texture_count();

    set.resize(&mut backend, &mut textures, UVec2::new(200, 100)).unwrap();

    assert_eq!(set.size(), UVec2::new(200, 100));
    assert!(textures.get(old_final).is_err());
    assert_eq!(backend.live_texture_count(), live_before);
    assert_eq!(backend.live_framebuffer_count(), 4);

    let final_color = textures.get(set.lighting().final_color).unwrap();
    assert_eq!(final_color.size, UVec2::new(200, 100));
    assert!(set.water().is_some());
}

#[test]
fn render_target_texture_maps_each_target() {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    let set = FramebufferSet::new(&mut backend, &mut textures, UVec2::new(16, 16), false).unwrap();
    let g = *set.gbuffer();

    assert_eq!(set.render_target_texture(RenderTarget::Color), g.color);
    assert_eq!(set.render_target_texture(RenderTarget::Position), g.position);
    assert_eq!(set.render_target_texture(RenderTarget::Normal), g.normal);
    assert_eq!(set.render_target_texture(RenderTarget::Depth), g.depth_preview);
    assert_eq!(
        set.render_target_texture(RenderTarget::Final),
        set.lighting().final_color
    );
}
