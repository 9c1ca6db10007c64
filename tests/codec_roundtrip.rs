use rendernode::{
    codec, Color, ColorStop, DecodeError, Display, Error, FillRule, MemoryFormat, PathBuilder,
    Point, Rect, RenderNode, Renderer, RendererKind, RoundedRect, Size, Stroke, Texture,
    TextureDownloader, Transform,
};

fn checkerboard() -> Texture {
    let mut pixels = Vec::with_capacity(8 * 8 * 4);
    for y in 0..8 {
        for x in 0..8 {
            if (x + y) % 2 == 0 {
                pixels.extend_from_slice(&[255, 255, 255, 255]);
            } else {
                pixels.extend_from_slice(&[0, 0, 128, 200]);
            }
        }
    }
    Texture::from_memory(8, 8, MemoryFormat::R8G8B8A8, pixels, 32).unwrap()
}

/// A tree using every node type, with shared subtrees
fn scene() -> RenderNode {
    let square = RenderNode::color(Rect::new(0.0, 0.0, 20.0, 20.0), Color::RED);
    let outline = RoundedRect::new(
        Rect::new(4.0, 4.0, 40.0, 30.0),
        [
            Size::new(6.0, 6.0),
            Size::new(2.0, 4.0),
            Size::new(0.0, 0.0),
            Size::new(8.0, 3.0),
        ],
    );

    let mut star = PathBuilder::new();
    star.move_to(30.0, 0.0)
        .line_to(40.0, 30.0)
        .line_to(10.0, 10.0)
        .line_to(50.0, 10.0)
        .line_to(20.0, 30.0)
        .close();
    let star = star.build();

    let mut wave = PathBuilder::new();
    wave.move_to(0.0, 50.0)
        .quad_to(15.0, 30.0, 30.0, 50.0)
        .cubic_to(40.0, 70.0, 50.0, 30.0, 60.0, 50.0);
    let mut stroke = Stroke::new(3.0);
    stroke.dash = vec![4.0, 2.0];

    RenderNode::container(vec![
        RenderNode::linear_gradient(
            Rect::new(0.0, 0.0, 64.0, 64.0),
            Point::new(0.0, 0.0),
            Point::new(64.0, 64.0),
            vec![
                ColorStop::new(0.0, Color::WHITE),
                ColorStop::new(0.5, Color::rgb(0.2, 0.6, 0.9)),
                ColorStop::new(1.0, Color::BLACK),
            ],
        ),
        RenderNode::outset_shadow(outline, Color::rgba(0.0, 0.0, 0.0, 0.6), 3.0, 2.0, 1.0, 6.0),
        RenderNode::border(
            outline,
            [2.0, 3.0, 4.0, 1.0],
            [Color::RED, Color::GREEN, Color::BLUE, Color::BLACK],
        ),
        RenderNode::texture(Rect::new(40.0, 40.0, 16.0, 16.0), checkerboard()),
        RenderNode::transform(square.clone(), Transform::rotate_degrees(30.0).center_at(10.0, 10.0)),
        RenderNode::opacity(
            RenderNode::transform(square.clone(), Transform::translate(30.0, 30.0)),
            0.4,
        ),
        RenderNode::color_matrix(
            RenderNode::clip(square.clone(), Rect::new(5.0, 5.0, 10.0, 10.0)),
            [
                0.0, 0.0, 1.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
            [0.1, 0.0, 0.0, 0.0],
        ),
        RenderNode::rounded_clip(
            RenderNode::blur(square.clone(), 3.0),
            RoundedRect::uniform(Rect::new(0.0, 30.0, 30.0, 30.0), 8.0),
        ),
        RenderNode::fill(
            RenderNode::color(Rect::new(0.0, 0.0, 64.0, 64.0), Color::GREEN),
            star,
            FillRule::EvenOdd,
        ),
        RenderNode::stroke(
            RenderNode::color(Rect::new(0.0, 0.0, 64.0, 64.0), Color::BLUE),
            wave.build(),
            stroke,
        ),
        RenderNode::cross_fade(
            square.clone(),
            RenderNode::color(Rect::new(44.0, 0.0, 20.0, 20.0), Color::BLUE),
            0.3,
        ),
        RenderNode::debug(square, "shared square"),
    ])
}

fn render(node: &RenderNode) -> Vec<u8> {
    let mut renderer = Renderer::new(RendererKind::Software);
    renderer
        .realize_for_display(&Display::software_only("test"))
        .unwrap();
    let texture = renderer
        .render_texture(node, Some(Rect::new(-8.0, -8.0, 80.0, 80.0)))
        .unwrap();
    let (bytes, _) = TextureDownloader::new(&texture).download_bytes().unwrap();
    bytes
}

#[test]
fn test_roundtrip_renders_identically() {
    let node = scene();
    let bytes = codec::serialize(&node).unwrap();
    let decoded = codec::deserialize(&bytes).unwrap();

    assert_eq!(decoded.bounds(), node.bounds());
    assert_eq!(decoded.node_count(), node.node_count());
    assert!(render(&decoded) == render(&node), "decoded tree renders differently");
}

#[test]
fn test_serialize_is_deterministic() {
    let node = scene();
    assert_eq!(codec::serialize(&node).unwrap(), codec::serialize(&node).unwrap());

    let decoded = codec::deserialize(&codec::serialize(&node).unwrap()).unwrap();
    assert_eq!(
        codec::serialize(&decoded).unwrap(),
        codec::serialize(&node).unwrap()
    );
}

#[test]
fn test_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.node");
    let node = scene();
    codec::save(&node, &path).unwrap();
    let loaded = codec::load(&path).unwrap();
    assert!(render(&loaded) == render(&node));
}

#[test]
fn test_corrupt_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.node");

    std::fs::write(&path, b"\x89PNG\r\n\x1a\n").unwrap();
    assert!(matches!(
        codec::load(&path),
        Err(Error::Decode(DecodeError::BadMagic))
    ));

    let mut bytes = codec::serialize(&scene()).unwrap();
    bytes.truncate(bytes.len() / 2);
    std::fs::write(&path, &bytes).unwrap();
    assert!(matches!(codec::load(&path), Err(Error::Decode(_))));

    assert!(matches!(
        codec::load(dir.path().join("missing.node")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_flipped_bytes_never_panic() {
    let bytes = codec::serialize(&scene()).unwrap();
    for i in (8..bytes.len()).step_by(7) {
        let mut corrupt = bytes.clone();
        corrupt[i] ^= 0xFF;
        // Either a valid tree or an error, never a panic
        let _ = codec::deserialize(&corrupt);
    }
}
