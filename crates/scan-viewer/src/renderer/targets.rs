//! Depth target shared by the scene pass. Colour goes straight to the swap chain.

pub struct DepthTarget {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl DepthTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Depth Target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            format: Self::FORMAT,
        }
    }

    /// Replaces the target; the old texture is destroyed first.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.texture.destroy();
        *self = Self::new(device, width, height);
    }

    pub fn release(&self) {
        self.texture.destroy();
    }
}
