use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use rendernode::gpu::{current_context, ContextBinding, GpuContext};
use rendernode::{
    Color, Display, GpuTextureBuilder, MemoryFormat, PowerPreference, Rect, RenderNode, Renderer,
    RendererKind, Texture,
};

const SIZE: u32 = 64;
const THREADS: usize = 8;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A GPU context on whichever backend is available, or `None` to skip.
fn gpu_context() -> Option<GpuContext> {
    for kind in [RendererKind::Gl, RendererKind::Vulkan] {
        match GpuContext::new(kind, PowerPreference::LowPower) {
            Ok(context) => return Some(context),
            Err(e) => log::info!("No {} context: {}", kind, e),
        }
    }
    log::warn!("Skipping GPU texture test: no adapter available");
    None
}

/// A realized GL or Vulkan renderer with its own context, or `None`.
fn gpu_renderer() -> Option<Renderer> {
    let display = Display::new("test");
    for kind in [RendererKind::Gl, RendererKind::Vulkan] {
        let mut renderer = Renderer::new(kind);
        match renderer.realize_for_display(&display) {
            Ok(()) => return Some(renderer),
            Err(e) => log::info!("No {} renderer: {}", kind, e),
        }
    }
    log::warn!("Skipping GPU renderer test: no adapter available");
    None
}

fn red_gpu_texture(context: &GpuContext) -> Texture {
    let _current = context.make_current();
    let extent = wgpu::Extent3d {
        width: SIZE,
        height: SIZE,
        depth_or_array_layers: 1,
    };
    let texture = context.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("red"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let pixels = [255u8, 0, 0, 255].repeat((SIZE * SIZE) as usize);
    context.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(SIZE * 4),
            rows_per_image: Some(SIZE),
        },
        extent,
    );
    context.queue().submit(std::iter::empty());

    GpuTextureBuilder::new()
        .context(context)
        .texture(texture)
        .build()
        .expect("Failed to build GPU texture")
}

/// Download on several threads at once; every copy must be complete and
/// no thread may be left with a context current.
fn download_concurrently(texture: &Texture, main_thread_work: impl Fn()) -> Vec<Vec<u8>> {
    let barrier = Arc::new(Barrier::new(THREADS + 1));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let texture = texture.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                assert_eq!(current_context(), None);
                barrier.wait();
                let mut data = vec![0u8; (SIZE * SIZE * 4) as usize];
                texture
                    .download(&mut data, (SIZE * 4) as usize)
                    .expect("download failed");
                assert_eq!(current_context(), None, "download left a context current");
                data
            })
        })
        .collect();

    barrier.wait();
    main_thread_work();

    handles
        .into_iter()
        .map(|h| h.join().expect("download thread panicked"))
        .collect()
}

fn assert_red(data: &[u8]) {
    for px in data.chunks_exact(4) {
        assert_eq!(u32::from_le_bytes([px[0], px[1], px[2], px[3]]), 0xFFFF0000);
    }
}

#[test]
fn test_gpu_texture_download_from_threads() {
    init_logger();
    let Some(context) = gpu_context() else {
        return;
    };
    let texture = red_gpu_texture(&context);
    assert!(texture.is_gpu());
    assert_eq!(texture.format(), MemoryFormat::R8G8B8A8Premultiplied);

    let results = download_concurrently(&texture, || {
        // Unrelated GPU work on the main thread while downloads run
        for _ in 0..16 {
            let _current = context.make_current();
            let buffer = context.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("scratch"),
                size: 256,
                usage: wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            context.queue().write_buffer(&buffer, 0, &[0u8; 256]);
            context.queue().submit(std::iter::empty());
        }
        assert!(!context.is_current());
    });

    assert_eq!(results.len(), THREADS);
    for data in &results {
        assert_red(data);
    }
    assert_eq!(current_context(), None);
}

#[test]
fn test_download_restores_current_context() {
    init_logger();
    let Some(context) = gpu_context() else {
        return;
    };
    let texture = red_gpu_texture(&context);

    let other = ContextBinding::new();
    let _outer = other.bind();
    let mut data = vec![0u8; (SIZE * SIZE * 4) as usize];
    texture.download(&mut data, (SIZE * 4) as usize).unwrap();
    assert_red(&data);
    assert_eq!(current_context(), Some(other.id()));
}

#[test]
fn test_memory_texture_download_from_threads() {
    let pixels = [0u8, 0, 255, 255].repeat((SIZE * SIZE) as usize);
    let texture = Texture::from_memory(
        SIZE,
        SIZE,
        MemoryFormat::B8G8R8A8Premultiplied,
        pixels,
        (SIZE * 4) as usize,
    )
    .unwrap();

    for data in download_concurrently(&texture, || {}) {
        assert_red(&data);
    }
}

#[test]
fn test_binding_serialises_threads() {
    let binding = Arc::new(ContextBinding::new());
    let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let binding = binding.clone();
            let inside = inside.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let _guard = binding.bind();
                    assert!(binding.is_current());
                    let others = inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    assert_eq!(others, 0, "two threads bound the same context");
                    inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                }
                assert_eq!(current_context(), None);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_nested_bind_restores_previous() {
    let a = ContextBinding::new();
    let b = ContextBinding::new();
    {
        let _a = a.bind();
        {
            let _b = b.bind();
            assert!(b.is_current());
            let _again = b.bind();
            assert!(b.is_current());
        }
        assert!(a.is_current());
    }
    assert_eq!(current_context(), None);
}

#[test]
fn test_renderers_draw_each_others_textures_concurrently() {
    init_logger();
    if gpu_renderer().is_none() {
        return;
    }
    let bounds = Rect::new(0.0, 0.0, SIZE as f32, SIZE as f32);
    let slots: Arc<Mutex<[Option<Texture>; 2]>> = Arc::new(Mutex::new([None, None]));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let slots = slots.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut renderer = gpu_renderer().expect("adapter went away");
                let own = renderer
                    .render_texture(&RenderNode::color(bounds, Color::RED), None)
                    .unwrap();
                slots.lock().unwrap()[i] = Some(own);
                barrier.wait();
                let other = slots.lock().unwrap()[1 - i].clone().unwrap();

                // Each thread reads back the other's context while drawing
                // with its own
                for _ in 0..20 {
                    let node = RenderNode::texture(bounds, other.clone());
                    let out = renderer.render_texture(&node, None).unwrap();
                    let mut data = vec![0u8; (SIZE * SIZE * 4) as usize];
                    out.download(&mut data, (SIZE * 4) as usize).unwrap();
                    assert_red(&data);
                }
                assert_eq!(current_context(), None);
                renderer.unrealize();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("render thread panicked");
    }
}
