use rendernode::{
    BackendRequest, Color, Config, Display, RealizeError, Rect, Region, RenderNode, Renderer,
    RendererKind, Surface, TextureDownloader,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn red_square() -> RenderNode {
    RenderNode::color(Rect::new(0.0, 0.0, 16.0, 16.0), Color::RED)
}

fn assert_red(renderer: &mut Renderer) {
    let texture = renderer.render_texture(&red_square(), None).unwrap();
    let (bytes, _) = TextureDownloader::new(&texture).download_bytes().unwrap();
    assert!(bytes
        .chunks_exact(4)
        .all(|px| u32::from_le_bytes([px[0], px[1], px[2], px[3]]) == 0xFFFF0000));
}

#[test]
fn test_gpu_on_software_display_fails_cleanly() {
    init_logger();
    let display = Display::software_only("no-gpu");

    for kind in [RendererKind::Gl, RendererKind::Vulkan] {
        let mut renderer = Renderer::with_config(kind, Config::new());
        let err = renderer.realize_for_display(&display).unwrap_err();
        assert!(
            matches!(err, RealizeError::BackendDisabled(k, _) if k == kind),
            "unexpected error: {}",
            err
        );
        assert!(!renderer.is_realized());
    }

    let mut fallback = Renderer::with_config(RendererKind::Software, Config::new());
    fallback.realize_for_display(&display).unwrap();
    assert_red(&mut fallback);
}

#[test]
fn test_probe_falls_back_to_software() {
    init_logger();
    let display = Display::software_only("no-gpu");
    let config = Config::new().with_backend(BackendRequest::Kind(RendererKind::Vulkan));
    let mut renderer = Renderer::for_display(&display, &config);
    assert_eq!(renderer.kind(), RendererKind::Software);
    assert!(renderer.is_realized());
    assert_red(&mut renderer);
}

#[test]
fn test_unrealize_is_idempotent() {
    let mut renderer = Renderer::with_config(RendererKind::Software, Config::new());
    renderer
        .realize_for_display(&Display::software_only("test"))
        .unwrap();
    renderer.unrealize();
    renderer.unrealize();
    assert!(!renderer.is_realized());

    // And it can be realized again
    renderer
        .realize_for_display(&Display::software_only("test"))
        .unwrap();
    assert_red(&mut renderer);
}

#[test]
#[should_panic(expected = "before it was realized")]
fn test_render_unrealized_panics() {
    let mut renderer = Renderer::with_config(RendererKind::Software, Config::new());
    let _ = renderer.render_texture(&red_square(), None);
}

#[test]
fn test_offscreen_surface_damage() {
    init_logger();
    let display = Display::software_only("test");
    let surface = Surface::offscreen(16, 16).unwrap();
    let mut renderer = Renderer::for_surface(&display, &surface, &Config::new()).unwrap();
    assert!(renderer.surface().unwrap().ptr_eq(&surface));

    renderer.render_to_surface(&red_square(), None).unwrap();

    let blue = RenderNode::color(Rect::new(0.0, 0.0, 16.0, 16.0), Color::BLUE);
    let mut damage = Region::new();
    red_square().diff(&blue, &mut damage);
    assert!(!damage.is_empty());

    // Only redraw the left half; the right half keeps the previous frame
    let mut left = Region::new();
    left.add_rect(Rect::new(0.0, 0.0, 8.0, 16.0));
    renderer.render_to_surface(&blue, Some(&left)).unwrap();

    let (bytes, stride) = TextureDownloader::new(&surface.snapshot().unwrap())
        .download_bytes()
        .unwrap();
    let px = |x: usize, y: usize| {
        let i = y * stride + x * 4;
        u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
    };
    assert_eq!(px(2, 2), 0xFF0000FF);
    assert_eq!(px(12, 2), 0xFFFF0000);
}

#[test]
fn test_renderer_names() {
    assert_eq!("cairo".parse::<RendererKind>(), Ok(RendererKind::Software));
    assert_eq!("ngl".parse::<RendererKind>(), Ok(RendererKind::Gl));
    assert!("metal".parse::<RendererKind>().is_err());
}
