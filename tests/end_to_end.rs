use rendernode::{
    Color, Display, MemoryFormat, Rect, RenderNode, Renderer, RendererKind, Snapshot, Texture,
    TextureError,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn software_renderer() -> Renderer {
    let mut renderer = Renderer::new(RendererKind::Software);
    renderer
        .realize_for_display(&Display::software_only("test"))
        .expect("software renderer always realizes");
    renderer
}

fn assert_all_pixels(data: &[u8], expected: u32) {
    for (i, px) in data.chunks_exact(4).enumerate() {
        let value = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
        assert_eq!(
            value, expected,
            "pixel {} is {:#010x}, expected {:#010x}",
            i, value, expected
        );
    }
}

#[test]
fn test_red_square_downloads_as_bgra() {
    init_logger();
    let node = RenderNode::color(Rect::new(0.0, 0.0, 64.0, 64.0), Color::RED);
    let mut renderer = software_renderer();

    let texture = renderer.render_texture(&node, None).unwrap();
    assert_eq!((texture.width(), texture.height()), (64, 64));

    let mut data = vec![0u8; 64 * 64 * 4];
    texture.download(&mut data, 64 * 4).unwrap();
    assert_all_pixels(&data, 0xFFFF0000);

    renderer.unrealize();
}

#[test]
fn test_snapshot_scene() {
    init_logger();
    let mut snapshot = Snapshot::new();
    snapshot.append_color(Color::BLUE, Rect::new(0.0, 0.0, 32.0, 32.0));
    snapshot.save();
    snapshot.translate(16.0, 0.0);
    snapshot.push_clip(Rect::new(0.0, 0.0, 16.0, 32.0));
    snapshot.append_color(Color::RED, Rect::new(0.0, 0.0, 64.0, 64.0));
    snapshot.pop();
    snapshot.restore();
    let node = snapshot.finish().expect("snapshot drew something");

    let mut renderer = software_renderer();
    let texture = renderer
        .render_texture(&node, Some(Rect::new(0.0, 0.0, 32.0, 32.0)))
        .unwrap();
    let mut data = vec![0u8; 32 * 32 * 4];
    texture.download(&mut data, 32 * 4).unwrap();

    let px = |x: usize, y: usize| {
        let i = (y * 32 + x) * 4;
        u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]])
    };
    assert_eq!(px(4, 4), 0xFF0000FF);
    assert_eq!(px(20, 4), 0xFFFF0000);
    assert_eq!(px(31, 31), 0xFFFF0000);
}

#[test]
fn test_download_with_padded_stride() {
    let node = RenderNode::color(Rect::new(0.0, 0.0, 8.0, 8.0), Color::GREEN);
    let texture = software_renderer().render_texture(&node, None).unwrap();

    let stride = 8 * 4 + 16;
    let mut data = vec![0xAAu8; stride * 8];
    texture.download(&mut data, stride).unwrap();
    for row in data.chunks_exact(stride) {
        assert_all_pixels(&row[..32], 0xFF00FF00);
        assert!(row[32..].iter().all(|b| *b == 0xAA));
    }
}

#[test]
fn test_download_rejects_overflowing_stride() {
    let node = RenderNode::color(Rect::new(0.0, 0.0, 2.0, 3.0), Color::GREEN);
    let texture = software_renderer().render_texture(&node, None).unwrap();

    let mut data = vec![0xAAu8; 64];
    let result = texture.download(&mut data, usize::MAX / 2 + 1);
    assert!(matches!(result, Err(TextureError::StrideOverflow { .. })));
    assert!(data.iter().all(|b| *b == 0xAA));

    let result = Texture::from_memory(
        2,
        3,
        MemoryFormat::B8G8R8A8Premultiplied,
        vec![0u8; 24],
        usize::MAX / 2 + 1,
    );
    assert!(matches!(result, Err(TextureError::StrideOverflow { .. })));
}
