use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use std::ptr;

use anyhow::{anyhow, Context, Result};
use libloading::Library;

use crate::engine::ffi::{raw_kernel, RawArray, RawVariant};
use crate::engine::{Engine, Layout, LoopVarPairs, NodePtr};
use crate::{engine_call, engine_return};
use crate::error::MapError;
use crate::ops::{BinaryOp, ReductionOp, UnaryOp};
use crate::scalar::{Coord, ScalarValue, ShapeVector};
use crate::types::{DataType, DeviceType, MemOrder, NumDim, StreamDir};

type RawNode = *mut c_void;

struct Api {
    setup_devices: unsafe extern "C" fn(*const c_char, c_int, *const c_char),
    set_num_ranks: unsafe extern "C" fn(c_int),
    increase_ref: unsafe extern "C" fn(RawNode),
    decrease_ref: unsafe extern "C" fn(RawNode),
    eval: unsafe extern "C" fn(*mut RawNode, c_int),
    value: unsafe extern "C" fn(RawNode) -> RawVariant,
    node_id: unsafe extern "C" fn(RawNode) -> c_int,
    data_type: unsafe extern "C" fn(RawNode) -> c_int,
    num_dim: unsafe extern "C" fn(RawNode) -> c_int,
    mem_order: unsafe extern "C" fn(RawNode) -> c_int,
    data_size: unsafe extern "C" fn(RawNode) -> RawArray,
    block_size: unsafe extern "C" fn(RawNode) -> RawArray,
    read: unsafe extern "C" fn(*const c_char) -> RawNode,
    write: unsafe extern "C" fn(RawNode, *const c_char) -> c_int,
    constant: unsafe extern "C" fn(RawVariant, RawArray, c_int, c_int, RawArray, RawArray) -> RawNode,
    rand: unsafe extern "C" fn(RawNode, c_int, c_int) -> RawNode,
    cast: unsafe extern "C" fn(RawNode, c_int) -> RawNode,
    index: unsafe extern "C" fn(RawArray, c_int, c_int, RawArray, RawArray) -> RawNode,
    conditional: unsafe extern "C" fn(RawNode, RawNode, RawNode) -> RawNode,
    unary: unsafe extern "C" fn(RawNode, c_int) -> RawNode,
    binary: unsafe extern "C" fn(RawNode, RawNode, c_int) -> RawNode,
    access: unsafe extern "C" fn(RawNode, RawArray) -> RawNode,
    lhs_access: unsafe extern "C" fn(RawNode, RawNode, RawArray) -> RawNode,
    neighbor: unsafe extern "C" fn(RawNode, RawArray) -> RawNode,
    bounded_neighbor: unsafe extern "C" fn(RawNode, RawNode, RawNode) -> RawNode,
    convolution: unsafe extern "C" fn(RawNode, *const RawVariant, c_int, RawArray) -> RawNode,
    focal_func: unsafe extern "C" fn(RawNode, *const RawVariant, c_int, RawArray, c_int) -> RawNode,
    zonal_reduc: unsafe extern "C" fn(RawNode, c_int) -> RawNode,
    radial_scan: unsafe extern "C" fn(RawNode, c_int, RawArray) -> RawNode,
    stats: unsafe extern "C" fn(RawNode, RawNode, RawNode, RawNode, RawNode) -> RawNode,
    block_stats: unsafe extern "C" fn(RawNode, c_int) -> RawNode,
    barrier: unsafe extern "C" fn(RawNode) -> RawNode,
    identity: unsafe extern "C" fn(RawNode) -> RawNode,
    loop_start: unsafe extern "C" fn(),
    loop_cond: unsafe extern "C" fn(RawNode),
    loop_body: unsafe extern "C" fn(),
    loop_again: unsafe extern "C" fn(),
    loop_assemble: unsafe extern "C" fn() -> RawNode,
    loop_update_vars: unsafe extern "C" fn(RawNode, *mut *mut RawNode, *mut *mut RawNode, *mut c_int),
    loop_end: unsafe extern "C" fn(),
    node_name: Option<unsafe extern "C" fn(RawNode) -> *const c_char>,
    stream_dir: Option<unsafe extern "C" fn(RawNode) -> c_int>,
    group_size: Option<unsafe extern "C" fn(RawNode) -> RawArray>,
}

unsafe fn required<T: Copy>(lib: &Library, name: &str) -> Result<T> {
    let symbol = lib
        .get::<T>(name.as_bytes())
        .with_context(|| format!("missing symbol {name}"))?;
    Ok(*symbol)
}

unsafe fn optional<T: Copy>(lib: &Library, name: &str) -> Option<T> {
    lib.get::<T>(name.as_bytes()).ok().map(|symbol| *symbol)
}

impl Api {
    unsafe fn load(lib: &Library) -> Result<Self> {
        Ok(Self {
            setup_devices: required(lib, "ma_setupDevices")?,
            set_num_ranks: required(lib, "ma_setNumRanks")?,
            increase_ref: required(lib, "ma_increaseRef")?,
            decrease_ref: required(lib, "ma_decreaseRef")?,
            eval: required(lib, "ma_eval")?,
            value: required(lib, "ma_value")?,
            node_id: required(lib, "ma_nodeid")?,
            data_type: required(lib, "ma_datatype")?,
            num_dim: required(lib, "ma_numdim")?,
            mem_order: required(lib, "ma_memorder")?,
            data_size: required(lib, "ma_datasize")?,
            block_size: required(lib, "ma_blocksize")?,
            read: required(lib, "ma_read")?,
            write: required(lib, "ma_write")?,
            constant: required(lib, "ma_constant")?,
            rand: required(lib, "ma_rand")?,
            cast: required(lib, "ma_cast")?,
            index: required(lib, "ma_index")?,
            conditional: required(lib, "ma_conditional")?,
            unary: required(lib, "ma_unary")?,
            binary: required(lib, "ma_binary")?,
            access: required(lib, "ma_access")?,
            lhs_access: required(lib, "ma_lhsAccess")?,
            neighbor: required(lib, "ma_neighbor")?,
            bounded_neighbor: required(lib, "ma_boundedNbh")?,
            convolution: required(lib, "ma_convolution")?,
            focal_func: required(lib, "ma_focalFunc")?,
            zonal_reduc: required(lib, "ma_zonalReduc")?,
            radial_scan: required(lib, "ma_radialScan")?,
            stats: required(lib, "ma_stats")?,
            block_stats: required(lib, "ma_blockStats")?,
            barrier: required(lib, "ma_barrier")?,
            identity: required(lib, "ma_identity")?,
            loop_start: required(lib, "ma_loopStart")?,
            loop_cond: required(lib, "ma_loopCond")?,
            loop_body: required(lib, "ma_loopBody")?,
            loop_again: required(lib, "ma_loopAgain")?,
            loop_assemble: required(lib, "ma_loopAssemble")?,
            loop_update_vars: required(lib, "ma_loopUpdateVars")?,
            loop_end: required(lib, "ma_loopEnd")?,
            node_name: match optional(lib, "ma_longname") {
                Some(symbol) => Some(symbol),
                None => optional(lib, "ma_nodename"),
            },
            stream_dir: optional(lib, "ma_streamdir"),
            group_size: optional(lib, "ma_groupsize"),
        })
    }
}

/// The native engine, bound at runtime from a shared library.
pub struct LibMap {
    api: Api,
    path: PathBuf,
    _lib: Library,
}

impl fmt::Debug for LibMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibMap").field("path", &self.path).finish()
    }
}

fn raw(node: NodePtr) -> RawNode {
    node.addr() as RawNode
}

fn built(symbol: &str, ptr: RawNode) -> NodePtr {
    let ptr = node(ptr);
    engine_return!(symbol, "{ptr}");
    ptr
}

fn node(ptr: RawNode) -> NodePtr {
    NodePtr::from_addr(ptr as usize)
}

fn c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| anyhow!("string '{}' contains an interior NUL", value))
}

fn kernel_len(kernel: &[ScalarValue]) -> Result<c_int> {
    c_int::try_from(kernel.len()).map_err(|_| MapError::invalid_shape("kernel too large"))
}

impl LibMap {
    /// Opens the first library in `paths` that exposes the full engine ABI.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut failures = Vec::new();
        for path in paths {
            match Self::open(path) {
                Ok(engine) => {
                    crate::trace!(Engine, "bound engine library {}", path.display());
                    return Ok(engine);
                }
                Err(err) => {
                    crate::warning!(Engine, "engine library {} unusable: {err:#}", path.display());
                    failures.push(format!("{}: {err:#}", path.display()));
                }
            }
        }
        Err(MapError::Binding {
            tried: paths.to_vec(),
            reason: if failures.is_empty() {
                "no search paths configured".to_string()
            } else {
                failures.join("; ")
            },
        }
        .into())
    }

    fn open(path: &Path) -> Result<Self> {
        // SAFETY: loading runs the library's initializers; symbols are
        // checked against the declared signatures by name only.
        unsafe {
            let lib = Library::new(path)?;
            let api = Api::load(&lib)?;
            Ok(Self {
                api,
                path: path.to_path_buf(),
                _lib: lib,
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Engine for LibMap {
    fn name(&self) -> &str {
        "libmap"
    }

    fn setup_devices(&self, platform: &str, devices: DeviceType, device_name: &str) -> Result<()> {
        let platform = c_string(platform)?;
        let device_name = c_string(device_name)?;
        engine_call!("setupDevices", "{:?}, {:#x}, {:?}", platform, devices.bits(), device_name);
        unsafe { (self.api.setup_devices)(platform.as_ptr(), devices.code(), device_name.as_ptr()) };
        Ok(())
    }

    fn set_num_ranks(&self, ranks: i32) -> Result<()> {
        engine_call!("setNumRanks", "{ranks}");
        unsafe { (self.api.set_num_ranks)(ranks) };
        Ok(())
    }

    fn increase_ref(&self, node: NodePtr) {
        engine_call!("increaseRef", "{node}");
        unsafe { (self.api.increase_ref)(raw(node)) }
    }

    fn decrease_ref(&self, node: NodePtr) {
        engine_call!("decreaseRef", "{node}");
        unsafe { (self.api.decrease_ref)(raw(node)) }
    }

    fn constant(&self, value: ScalarValue, layout: &Layout) -> Result<NodePtr> {
        let ptr = unsafe {
            (self.api.constant)(
                value.into(),
                layout.size.into(),
                layout.dtype.code(),
                layout.order.code(),
                layout.block.into(),
                layout.group.into(),
            )
        };
        Ok(built("constant", ptr))
    }

    fn index(&self, layout: &Layout, dim: NumDim) -> Result<NodePtr> {
        let ptr = unsafe {
            (self.api.index)(
                layout.size.into(),
                dim.code(),
                layout.order.code(),
                layout.block.into(),
                layout.group.into(),
            )
        };
        Ok(built("index", ptr))
    }

    fn rand(&self, seed: NodePtr, dtype: DataType, order: MemOrder) -> Result<NodePtr> {
        Ok(built("rand", unsafe { (self.api.rand)(raw(seed), dtype.code(), order.code()) }))
    }

    fn cast(&self, node_ptr: NodePtr, dtype: DataType) -> Result<NodePtr> {
        Ok(built("cast", unsafe { (self.api.cast)(raw(node_ptr), dtype.code()) }))
    }

    fn unary(&self, node_ptr: NodePtr, op: UnaryOp) -> Result<NodePtr> {
        Ok(built("unary", unsafe { (self.api.unary)(raw(node_ptr), op.code()) }))
    }

    fn binary(&self, lhs: NodePtr, rhs: NodePtr, op: BinaryOp) -> Result<NodePtr> {
        Ok(built("binary", unsafe { (self.api.binary)(raw(lhs), raw(rhs), op.code()) }))
    }

    fn conditional(&self, cond: NodePtr, then: NodePtr, otherwise: NodePtr) -> Result<NodePtr> {
        Ok(built("conditional", unsafe {
            (self.api.conditional)(raw(cond), raw(then), raw(otherwise))
        }))
    }

    fn access(&self, node_ptr: NodePtr, coord: Coord) -> Result<NodePtr> {
        Ok(built("access", unsafe { (self.api.access)(raw(node_ptr), coord.into()) }))
    }

    fn lhs_access(&self, node_ptr: NodePtr, value: NodePtr, coord: Coord) -> Result<NodePtr> {
        Ok(built("lhsAccess", unsafe {
            (self.api.lhs_access)(raw(node_ptr), raw(value), coord.into())
        }))
    }

    fn neighbor(&self, node_ptr: NodePtr, offset: Coord) -> Result<NodePtr> {
        Ok(built("neighbor", unsafe { (self.api.neighbor)(raw(node_ptr), offset.into()) }))
    }

    fn bounded_neighbor(&self, node_ptr: NodePtr, rows: NodePtr, cols: NodePtr) -> Result<NodePtr> {
        Ok(built("boundedNeighbor", unsafe {
            (self.api.bounded_neighbor)(raw(node_ptr), raw(rows), raw(cols))
        }))
    }

    fn convolution(
        &self,
        node_ptr: NodePtr,
        kernel: &[ScalarValue],
        shape: ShapeVector,
    ) -> Result<NodePtr> {
        let len = kernel_len(kernel)?;
        let values = raw_kernel(kernel);
        Ok(built("convolution", unsafe {
            (self.api.convolution)(raw(node_ptr), values.as_ptr(), len, shape.into())
        }))
    }

    fn focal_func(
        &self,
        node_ptr: NodePtr,
        kernel: &[ScalarValue],
        shape: ShapeVector,
        op: ReductionOp,
    ) -> Result<NodePtr> {
        let len = kernel_len(kernel)?;
        let values = raw_kernel(kernel);
        Ok(built("focalFunc", unsafe {
            (self.api.focal_func)(raw(node_ptr), values.as_ptr(), len, shape.into(), op.code())
        }))
    }

    fn zonal_reduc(&self, node_ptr: NodePtr, op: ReductionOp) -> Result<NodePtr> {
        Ok(built("zonalReduc", unsafe { (self.api.zonal_reduc)(raw(node_ptr), op.code()) }))
    }

    fn radial_scan(&self, node_ptr: NodePtr, op: ReductionOp, coord: Coord) -> Result<NodePtr> {
        Ok(built("radialScan", unsafe {
            (self.api.radial_scan)(raw(node_ptr), op.code(), coord.into())
        }))
    }

    fn block_stats(&self, node_ptr: NodePtr, op: ReductionOp) -> Result<NodePtr> {
        Ok(built("blockStats", unsafe { (self.api.block_stats)(raw(node_ptr), op.code()) }))
    }

    fn stats(
        &self,
        node_ptr: NodePtr,
        min: NodePtr,
        max: NodePtr,
        mean: NodePtr,
        std: NodePtr,
    ) -> Result<NodePtr> {
        Ok(built("stats", unsafe {
            (self.api.stats)(raw(node_ptr), raw(min), raw(max), raw(mean), raw(std))
        }))
    }

    fn barrier(&self, node_ptr: NodePtr) -> Result<NodePtr> {
        Ok(built("barrier", unsafe { (self.api.barrier)(raw(node_ptr)) }))
    }

    fn identity(&self, node_ptr: NodePtr) -> Result<NodePtr> {
        Ok(built("identity", unsafe { (self.api.identity)(raw(node_ptr)) }))
    }

    fn loop_start(&self) -> Result<()> {
        engine_call!("loopStart");
        unsafe { (self.api.loop_start)() };
        Ok(())
    }

    fn loop_cond(&self, cond: NodePtr) -> Result<()> {
        engine_call!("loopCond", "{cond}");
        unsafe { (self.api.loop_cond)(raw(cond)) };
        Ok(())
    }

    fn loop_body(&self) -> Result<()> {
        engine_call!("loopBody");
        unsafe { (self.api.loop_body)() };
        Ok(())
    }

    fn loop_again(&self) -> Result<()> {
        engine_call!("loopAgain");
        unsafe { (self.api.loop_again)() };
        Ok(())
    }

    fn loop_assemble(&self) -> Result<NodePtr> {
        let ptr = node(unsafe { (self.api.loop_assemble)() });
        engine_return!("loopAssemble", "{ptr}");
        Ok(ptr)
    }

    fn loop_end(&self) -> Result<()> {
        engine_call!("loopEnd");
        unsafe { (self.api.loop_end)() };
        Ok(())
    }

    fn loop_update_vars(&self, loop_node: NodePtr) -> Result<LoopVarPairs> {
        let mut pre: *mut RawNode = ptr::null_mut();
        let mut post: *mut RawNode = ptr::null_mut();
        let mut num: c_int = 0;
        unsafe { (self.api.loop_update_vars)(raw(loop_node), &mut pre, &mut post, &mut num) };
        let count = usize::try_from(num)
            .map_err(|_| MapError::engine(format!("negative loop variable count {num}")))?;
        if count == 0 {
            return Ok(LoopVarPairs::default());
        }
        if pre.is_null() || post.is_null() {
            return Err(MapError::engine("loop variable arrays missing"));
        }
        // SAFETY: the engine owns both arrays and sizes them to `num`.
        let (pre, post) = unsafe {
            (
                std::slice::from_raw_parts(pre, count),
                std::slice::from_raw_parts(post, count),
            )
        };
        engine_return!("loopUpdateVars", "{count} pairs for {loop_node}");
        Ok(LoopVarPairs {
            pre: pre.iter().map(|&ptr| node(ptr)).collect(),
            post: post.iter().map(|&ptr| node(ptr)).collect(),
        })
    }

    fn read(&self, resource: &str) -> Result<NodePtr> {
        let path = c_string(resource)?;
        Ok(built("read", unsafe { (self.api.read)(path.as_ptr()) }))
    }

    fn write(&self, node_ptr: NodePtr, resource: &str) -> Result<i32> {
        let path = c_string(resource)?;
        let status = unsafe { (self.api.write)(raw(node_ptr), path.as_ptr()) };
        engine_return!("write", "{status} for {node_ptr} -> {resource:?}");
        Ok(status)
    }

    fn eval(&self, nodes: &[NodePtr]) -> Result<()> {
        let mut raws: Vec<RawNode> = nodes.iter().map(|&ptr| raw(ptr)).collect();
        let len = c_int::try_from(raws.len()).map_err(|_| anyhow!("too many nodes to evaluate"))?;
        engine_call!("eval", "{len} nodes");
        unsafe { (self.api.eval)(raws.as_mut_ptr(), len) };
        Ok(())
    }

    fn value(&self, node_ptr: NodePtr) -> Result<ScalarValue> {
        ScalarValue::try_from(unsafe { (self.api.value)(raw(node_ptr)) })
    }

    fn node_id(&self, node_ptr: NodePtr) -> Result<i32> {
        Ok(unsafe { (self.api.node_id)(raw(node_ptr)) })
    }

    fn node_name(&self, node_ptr: NodePtr) -> Result<String> {
        match self.api.node_name {
            Some(name) => {
                let text = unsafe { name(raw(node_ptr)) };
                if text.is_null() {
                    return Err(MapError::engine("engine returned no node name"));
                }
                // SAFETY: the engine returns a NUL-terminated string it keeps alive.
                Ok(unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
            }
            None => Ok(format!("node{}", self.node_id(node_ptr)?)),
        }
    }

    fn stream_dir(&self, node_ptr: NodePtr) -> Result<StreamDir> {
        match self.api.stream_dir {
            Some(dir) => StreamDir::from_code(unsafe { dir(raw(node_ptr)) }),
            None => Ok(StreamDir::None),
        }
    }

    fn data_type(&self, node_ptr: NodePtr) -> Result<DataType> {
        DataType::from_code(unsafe { (self.api.data_type)(raw(node_ptr)) })
    }

    fn num_dim(&self, node_ptr: NodePtr) -> Result<NumDim> {
        NumDim::from_code(unsafe { (self.api.num_dim)(raw(node_ptr)) })
    }

    fn mem_order(&self, node_ptr: NodePtr) -> Result<MemOrder> {
        MemOrder::from_code(unsafe { (self.api.mem_order)(raw(node_ptr)) })
    }

    fn data_size(&self, node_ptr: NodePtr) -> Result<ShapeVector> {
        ShapeVector::try_from(unsafe { (self.api.data_size)(raw(node_ptr)) })
    }

    fn block_size(&self, node_ptr: NodePtr) -> Result<ShapeVector> {
        ShapeVector::try_from(unsafe { (self.api.block_size)(raw(node_ptr)) })
    }

    fn group_size(&self, node_ptr: NodePtr) -> Result<ShapeVector> {
        match self.api.group_size {
            Some(size) => ShapeVector::try_from(unsafe { size(raw(node_ptr)) }),
            None => Ok(ShapeVector::unset()),
        }
    }
}
