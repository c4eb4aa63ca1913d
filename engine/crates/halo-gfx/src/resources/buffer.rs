use anyhow::{Context, bail};
use ash::vk;
use std::ptr;

use vk_mem::Alloc;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,
    /// 只有在 buffer usage 包含 SHADER_DEVICE_ADDRESS 时才有值
    device_addr: Option<vk::DeviceAddress>,

    debug_name: String,
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        let allocator = Gfx::get().allocator();
        unsafe {
            if self.map_ptr.is_some() {
                allocator.unmap_memory(&mut self.allocation);
            }

            allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}
// init
impl GfxBuffer {
    /// - align: buffer 起始地址的内存对齐，默认对齐到 8 字节
    /// - mem_map: 是否需要 host 访问，为 true 时会持久 map
    pub fn new(
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        align: Option<vk::DeviceSize>,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let name = name.as_ref();
        // 不允许 UNIFORM + DBA 的组合
        if buffer_usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            bail!("GfxBuffer {name}: UNIFORM_BUFFER + SHADER_DEVICE_ADDRESS is not allowed");
        }

        let buffer_ci = vk::BufferCreateInfo::default().size(buffer_size).usage(buffer_usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let allocator = Gfx::get().allocator();
        let (buffer, mut alloc) =
            unsafe { allocator.create_buffer_with_alignment(&buffer_ci, &alloc_ci, align.unwrap_or(8)) }
                .with_context(|| format!("allocate buffer {name} ({buffer_size} bytes)"))?;

        let mut map_ptr = None;
        if mem_map {
            match unsafe { allocator.map_memory(&mut alloc) } {
                Ok(ptr) => map_ptr = Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut alloc) };
                    return Err(e).with_context(|| format!("map buffer {name}"));
                }
            }
        }

        let gfx_device = Gfx::get().gfx_device();
        let device_addr = buffer_usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS).then(|| unsafe {
            gfx_device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer))
        });

        let buffer = Self {
            handle: buffer,
            allocation: alloc,
            size: buffer_size,
            map_ptr,
            device_addr,
            debug_name: name.to_string(),
        };
        gfx_device.set_debug_name(&buffer, name);
        Ok(buffer)
    }

    #[inline]
    pub fn new_stage_buffer(size: vk::DeviceSize, debug_name: impl AsRef<str>) -> anyhow::Result<Self> {
        Self::new(size, vk::BufferUsageFlags::TRANSFER_SRC, None, true, debug_name)
    }

    /// 创建 device local 的 buffer，并通过 stage buffer 同步上传数据
    pub fn new_with_data<T: bytemuck::Pod>(
        data: &[T],
        buffer_usage: vk::BufferUsageFlags,
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let size = size_of_val(data).max(1) as vk::DeviceSize;
        let buffer = Self::new(size, buffer_usage | vk::BufferUsageFlags::TRANSFER_DST, None, false, name)?;
        buffer.transfer_data_sync(data)?;
        Ok(buffer)
    }
}
// getter
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    /// buffer usage 不包含 SHADER_DEVICE_ADDRESS 时返回 None
    #[inline]
    pub fn device_address(&self) -> Option<vk::DeviceAddress> {
        self.device_addr
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.debug_name
    }
}
// tools
impl GfxBuffer {
    fn mapped_ptr(&self) -> anyhow::Result<*mut u8> {
        self.map_ptr.with_context(|| format!("buffer {} is not host mapped", self.debug_name))
    }

    /// 通过 mem map 的方式将 data 写入 buffer 的 offset 处
    pub fn write_by_mmap<T: bytemuck::Pod>(&self, offset: vk::DeviceSize, data: &[T]) -> anyhow::Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if offset + bytes.len() as vk::DeviceSize > self.size {
            bail!("write {} bytes at {} overflows buffer {}", bytes.len(), offset, self.debug_name);
        }
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped_ptr()?.add(offset as usize), bytes.len());
        }
        Gfx::get()
            .allocator()
            .flush_allocation(&self.allocation, offset, bytes.len() as vk::DeviceSize)
            .with_context(|| format!("flush buffer {}", self.debug_name))
    }

    /// 通过 mem map 读取 offset 处的一个值，读取之前会 invalidate，确保 GPU 的写入对 host 可见
    pub fn read_by_mmap<T: bytemuck::Pod>(&self, offset: vk::DeviceSize) -> anyhow::Result<T> {
        let size = size_of::<T>() as vk::DeviceSize;
        if offset + size > self.size {
            bail!("read {} bytes at {} overflows buffer {}", size, offset, self.debug_name);
        }
        Gfx::get()
            .allocator()
            .invalidate_allocation(&self.allocation, offset, size)
            .with_context(|| format!("invalidate buffer {}", self.debug_name))?;
        let value = unsafe { ptr::read_unaligned(self.mapped_ptr()?.add(offset as usize) as *const T) };
        Ok(value)
    }

    /// 创建一个临时的 stage buffer，先将数据放入 stage buffer，再 transfer 到 self
    ///
    /// 同步等待，只用于加载阶段的大块数据
    pub fn transfer_data_sync<T: bytemuck::Pod>(&self, data: &[T]) -> anyhow::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let size = size_of_val(data) as vk::DeviceSize;
        let stage_buffer = Self::new_stage_buffer(size, format!("{}-stage-buffer", self.debug_name))?;
        stage_buffer.write_by_mmap(0, data)?;

        Gfx::get().one_time_exec(
            |cmd| {
                cmd.cmd_copy_buffer(
                    stage_buffer.vk_buffer(),
                    self.handle,
                    &[vk::BufferCopy {
                        size,
                        ..Default::default()
                    }],
                );
            },
            &format!("{}-transfer-data", self.debug_name),
        )
    }
}
