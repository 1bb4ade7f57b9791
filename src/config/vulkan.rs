use std::sync::Arc;

use log::info;
use vulkano::device::physical::PhysicalDeviceType;
use vulkano::device::{Device, DeviceCreateInfo, DeviceExtensions, Features, Queue, QueueCreateInfo};
use vulkano::image::view::ImageView;
use vulkano::image::{ImageUsage, SwapchainImage};
use vulkano::instance::{Instance, InstanceCreateInfo};
use vulkano::swapchain::{Surface, Swapchain, SwapchainCreateInfo, SwapchainCreationError};
use vulkano::VulkanLibrary;
use vulkano_win::VkSurfaceBuild;
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

use crate::error::GfxError;

/// The device-level graphics state: one window surface, one graphics
/// queue and the swapchain presenting to it. Everything else in the
/// frame module hangs off the queue stored here.
pub struct GfxContext {
    pub surface: Arc<Surface<Window>>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub swapchain: Arc<Swapchain<Window>>,
    pub images: Vec<Arc<ImageView<SwapchainImage<Window>>>>,
    pub max_anisotropy: Option<f32>,
}

impl GfxContext {
    pub fn new(event_loop: &EventLoop<()>, title: &str) -> Result<GfxContext, GfxError> {
        let library = VulkanLibrary::new().map_err(|e| GfxError::creation("vulkan library", e))?;
        let required_extensions = vulkano_win::required_extensions(&library);
        let instance = Instance::new(
            library,
            InstanceCreateInfo {
                enabled_extensions: required_extensions,
                // Enable enumerating devices that use non-conformant vulkan implementations. (ex. MoltenVK)
                enumerate_portability: true,
                ..Default::default()
            },
        )
        .map_err(|e| GfxError::creation("instance", e))?;

        let surface = WindowBuilder::new()
            .with_title(title)
            .build_vk_surface(event_loop, instance.clone())
            .map_err(|e| GfxError::creation("window surface", e))?;

        let device_extensions = DeviceExtensions {
            khr_swapchain: true,
            ..DeviceExtensions::empty()
        };
        let (physical_device, queue_family_index) = instance
            .enumerate_physical_devices()
            .map_err(|e| GfxError::creation("physical device enumeration", e))?
            .filter(|p| p.supported_extensions().contains(&device_extensions))
            .filter_map(|p| {
                p.queue_family_properties()
                    .iter()
                    .enumerate()
                    .position(|(i, q)| {
                        q.queue_flags.graphics
                            && p.surface_support(i as u32, &surface).unwrap_or(false)
                    })
                    .map(|i| (p, i as u32))
            })
            .min_by_key(|(p, _)| match p.properties().device_type {
                PhysicalDeviceType::DiscreteGpu => 0,
                PhysicalDeviceType::IntegratedGpu => 1,
                PhysicalDeviceType::VirtualGpu => 2,
                PhysicalDeviceType::Cpu => 3,
                _ => 4,
            })
            .ok_or(GfxError::NoSuitableDevice)?;

        info!(
            "using device: {} (type: {:?})",
            physical_device.properties().device_name,
            physical_device.properties().device_type
        );

        let anisotropy_supported = physical_device.supported_features().sampler_anisotropy;
        let max_anisotropy = if anisotropy_supported {
            Some(
                physical_device
                    .properties()
                    .max_sampler_anisotropy
                    .min(16.0),
            )
        } else {
            None
        };

        let (device, mut queues) = Device::new(
            physical_device.clone(),
            DeviceCreateInfo {
                enabled_extensions: device_extensions,
                enabled_features: Features {
                    sampler_anisotropy: anisotropy_supported,
                    ..Features::empty()
                },
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .map_err(|e| GfxError::creation("device", e))?;
        let queue = queues.next().ok_or(GfxError::NoSuitableDevice)?;

        let (swapchain, images) = create_swapchain(device.clone(), surface.clone())?;

        Ok(GfxContext {
            surface,
            device,
            queue,
            swapchain,
            images,
            max_anisotropy,
        })
    }

    /// Rebuilds the swapchain at the window's current size. Returns
    /// `Ok(false)` when the extent is transiently unsupported (mid
    /// resize), in which case the caller should skip this frame and try
    /// again later.
    pub fn recreate_swapchain(&mut self) -> Result<bool, GfxError> {
        let dimensions = self.surface.window().inner_size();
        let (new_swapchain, new_images) = match self.swapchain.recreate(SwapchainCreateInfo {
            image_extent: dimensions.into(),
            ..self.swapchain.create_info()
        }) {
            Ok(r) => r,
            Err(SwapchainCreationError::ImageExtentNotSupported { .. }) => return Ok(false),
            Err(e) => return Err(GfxError::creation("swapchain", e)),
        };

        let mut images = Vec::with_capacity(new_images.len());
        for image in new_images {
            images.push(
                ImageView::new_default(image)
                    .map_err(|e| GfxError::creation("swapchain image view", e))?,
            );
        }
        self.swapchain = new_swapchain;
        self.images = images;
        Ok(true)
    }
}

fn create_swapchain(
    device: Arc<Device>,
    surface: Arc<Surface<Window>>,
) -> Result<
    (
        Arc<Swapchain<Window>>,
        Vec<Arc<ImageView<SwapchainImage<Window>>>>,
    ),
    GfxError,
> {
    let surface_capabilities = device
        .physical_device()
        .surface_capabilities(&surface, Default::default())
        .map_err(|e| GfxError::creation("surface capability query", e))?;
    let image_format = device
        .physical_device()
        .surface_formats(&surface, Default::default())
        .map_err(|e| GfxError::creation("surface format query", e))?
        .first()
        .map(|(format, _)| *format);
    let composite_alpha = surface_capabilities
        .supported_composite_alpha
        .iter()
        .next()
        .ok_or(GfxError::NoSuitableDevice)?;

    let (swapchain, images) = Swapchain::new(
        device,
        surface.clone(),
        SwapchainCreateInfo {
            min_image_count: surface_capabilities.min_image_count + 1,
            image_format,
            image_extent: surface.window().inner_size().into(),
            image_usage: ImageUsage {
                color_attachment: true,
                ..ImageUsage::empty()
            },
            composite_alpha,
            ..Default::default()
        },
    )
    .map_err(|e| GfxError::creation("swapchain", e))?;

    let mut views = Vec::with_capacity(images.len());
    for image in images {
        views.push(
            ImageView::new_default(image)
                .map_err(|e| GfxError::creation("swapchain image view", e))?,
        );
    }
    Ok((swapchain, views))
}
