//! C structures forwarding to native objects (the reverse adapter's base).
//!
//! [`to_c`] boxes a native object behind a C structure whose function
//! pointers the [`Binding`] fills in; the structure carries its own
//! reference count. Every live structure is recorded by address, so
//! [`to_native`] hands back the original object instead of stacking a
//! second adapter on top of the first.

use std::any::TypeId;
use std::collections::HashMap;
use std::mem::size_of;
use std::os::raw::c_int;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::trace;

use crate::base::{self, CBase, CBaseScoped, RefCounted, Scoped};
use crate::forward::Handle;
use crate::tracker::AdapterCounters;

/// Glue between one interface's C structure and its native trait.
pub trait Binding: Sized + 'static {
    type Struct: RefCounted + Default + 'static;
    type Native: ?Sized + Send + Sync + 'static;

    /// Class name used in log events.
    const NAME: &'static str;

    /// Set the method function pointers of a new structure.
    fn fill(s: &mut Self::Struct);

    /// Native object forwarding to a C structure.
    fn forward(handle: Handle<Self::Struct>) -> Arc<Self::Native>;

    /// The structure behind `object` when it is itself a forward adapter.
    fn unwrap_forward(_object: &Self::Native) -> Option<*mut Self::Struct> {
        None
    }

    fn counters() -> &'static AdapterCounters;
}

#[repr(C)]
struct Wrapper<B: Binding> {
    c: B::Struct,
    refct: AtomicI32,
    object: Arc<B::Native>,
}

fn registry() -> MutexGuard<'static, HashMap<usize, TypeId>> {
    static REGISTRY: OnceLock<Mutex<HashMap<usize, TypeId>>> = OnceLock::new();
    REGISTRY
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn is_wrapper<B: 'static, S>(s: *mut S) -> bool {
    registry().get(&(s as usize)) == Some(&TypeId::of::<B>())
}

unsafe extern "C" fn wrapper_add_ref<B: Binding>(this: *mut CBase) -> c_int {
    match this.cast::<Wrapper<B>>().as_ref() {
        Some(w) => w.refct.fetch_add(1, Ordering::AcqRel) + 1,
        None => 0,
    }
}

unsafe extern "C" fn wrapper_release<B: Binding>(this: *mut CBase) -> c_int {
    let wrapper = this.cast::<Wrapper<B>>();
    let remaining = match wrapper.as_ref() {
        Some(w) => w.refct.fetch_sub(1, Ordering::AcqRel) - 1,
        None => return 0,
    };
    if remaining == 0 {
        registry().remove(&(wrapper as usize));
        drop(Box::from_raw(wrapper));
        B::counters().reverse.decrement();
        trace!(class = B::NAME, "reverse adapter destroyed");
    }
    remaining
}

unsafe extern "C" fn wrapper_refct<B: Binding>(this: *mut CBase) -> c_int {
    match this.cast::<Wrapper<B>>().as_ref() {
        Some(w) => w.refct.load(Ordering::Acquire),
        None => 0,
    }
}

/// C structure for `object`, carrying one reference for the caller.
///
/// `None` yields null. A forward adapter yields the structure it wraps.
pub fn to_c<B: Binding>(object: Option<Arc<B::Native>>) -> *mut B::Struct {
    let Some(object) = object else {
        return ptr::null_mut();
    };
    if let Some(s) = B::unwrap_forward(&object) {
        // SAFETY: a forward adapter keeps its structure alive.
        unsafe { base::add_ref(s) };
        return s;
    }

    let mut c = B::Struct::default();
    B::fill(&mut c);
    // SAFETY: `RefCounted` structures start with a `CBase`.
    let header = unsafe { &mut *(&mut c as *mut B::Struct).cast::<CBase>() };
    header.size = size_of::<B::Struct>();
    header.add_ref = Some(wrapper_add_ref::<B>);
    header.release = Some(wrapper_release::<B>);
    header.get_refct = Some(wrapper_refct::<B>);

    let wrapper = Box::into_raw(Box::new(Wrapper::<B> {
        c,
        refct: AtomicI32::new(1),
        object,
    }));
    let s = wrapper.cast::<B::Struct>();
    registry().insert(s as usize, TypeId::of::<B>());
    B::counters().reverse.increment();
    trace!(class = B::NAME, "reverse adapter created");
    s
}

/// The native object behind a structure from [`to_c`], for method thunks.
///
/// Null and structures not made by [`to_c`] for `B` yield `None`.
///
/// # Safety
///
/// `s` must be null or point to a live structure.
pub unsafe fn object<B: Binding>(s: *mut B::Struct) -> Option<Arc<B::Native>> {
    if s.is_null() || !is_wrapper::<B, _>(s) {
        return None;
    }
    let wrapper = &*s.cast::<Wrapper<B>>();
    Some(Arc::clone(&wrapper.object))
}

/// Native object for a structure, taking over the caller's reference.
///
/// A structure made by [`to_c`] yields the object it wraps; any other
/// structure gets a new forward adapter.
///
/// # Safety
///
/// `s` must be null or point to a live structure whose reference the
/// caller gives up.
pub unsafe fn to_native<B: Binding>(s: *mut B::Struct) -> Option<Arc<B::Native>> {
    if let Some(object) = object::<B>(s) {
        base::release(s);
        return Some(object);
    }
    let handle = Handle::adopt(s)?.counted(&B::counters().forward);
    trace!(class = B::NAME, "forward adapter created");
    Some(B::forward(handle))
}

/// Glue for a scoped interface, lent across one call.
pub trait ScopedBinding: Sized + 'static {
    type Struct: Scoped + Default + 'static;
    type Native: ?Sized + 'static;

    const NAME: &'static str;

    fn fill(s: &mut Self::Struct);
}

#[repr(C)]
struct ScopedWrapper<B: ScopedBinding> {
    c: B::Struct,
    object: *const B::Native,
}

/// Lend `object` to C as a structure valid only inside `f`.
pub fn with_raw<B: ScopedBinding, R>(object: &B::Native, f: impl FnOnce(*mut B::Struct) -> R) -> R {
    let mut c = B::Struct::default();
    B::fill(&mut c);
    // SAFETY: `Scoped` structures start with a `CBaseScoped`.
    let header = unsafe { &mut *(&mut c as *mut B::Struct).cast::<CBaseScoped>() };
    header.size = size_of::<B::Struct>();
    header.del = None;

    let mut wrapper = ScopedWrapper::<B> {
        c,
        object: object as *const B::Native,
    };
    let s = (&mut wrapper as *mut ScopedWrapper<B>).cast::<B::Struct>();
    registry().insert(s as usize, TypeId::of::<B>());
    trace!(class = B::NAME, "scoped structure lent");

    struct Unregister(usize);
    impl Drop for Unregister {
        fn drop(&mut self) {
            registry().remove(&self.0);
        }
    }
    let _unregister = Unregister(s as usize);
    f(s)
}

/// The native object lent through [`with_raw`], for method thunks.
///
/// # Safety
///
/// `s` must be null or point to a live structure, and the returned
/// reference must not outlive the [`with_raw`] call that lent it.
pub unsafe fn scoped_object<'a, B: ScopedBinding>(s: *mut B::Struct) -> Option<&'a B::Native> {
    if s.is_null() || !is_wrapper::<B, _>(s) {
        return None;
    }
    let wrapper = &*s.cast::<ScopedWrapper<B>>();
    wrapper.object.as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Echo: Send + Sync {
        fn echo(&self, n: i32) -> i32;
    }

    struct Doubler;

    impl Echo for Doubler {
        fn echo(&self, n: i32) -> i32 {
            n * 2
        }
    }

    #[repr(C)]
    #[derive(Default)]
    struct CEcho {
        base: CBase,
        echo: Option<unsafe extern "C" fn(*mut CEcho, c_int) -> c_int>,
    }

    unsafe impl RefCounted for CEcho {}

    unsafe extern "C" fn echo_echo(s: *mut CEcho, n: c_int) -> c_int {
        object::<EchoBinding>(s).map_or(0, |o| o.echo(n))
    }

    struct EchoCppToC(Handle<CEcho>);

    impl Echo for EchoCppToC {
        fn echo(&self, n: i32) -> i32 {
            match self.0.member(std::mem::offset_of!(CEcho, echo), |s| s.echo) {
                Some(f) => unsafe { f(self.0.as_ptr(), n) },
                None => 0,
            }
        }
    }

    static COUNTERS: AdapterCounters = AdapterCounters::new();

    struct EchoBinding;

    impl Binding for EchoBinding {
        type Struct = CEcho;
        type Native = dyn Echo;
        const NAME: &'static str = "Echo";

        fn fill(s: &mut CEcho) {
            s.echo = Some(echo_echo);
        }

        fn forward(handle: Handle<CEcho>) -> Arc<dyn Echo> {
            Arc::new(EchoCppToC(handle))
        }

        fn counters() -> &'static AdapterCounters {
            &COUNTERS
        }
    }

    #[test]
    fn structure_reaches_the_native_object() {
        let native: Arc<dyn Echo> = Arc::new(Doubler);
        let s = to_c::<EchoBinding>(Some(Arc::clone(&native)));
        assert!(!s.is_null());
        unsafe {
            assert_eq!(base::header(s).size, size_of::<CEcho>());
            assert_eq!(base::refct(s), 1);
            assert_eq!(((*s).echo.unwrap())(s, 21), 42);
        }
        assert_eq!(Arc::strong_count(&native), 2);

        let back = unsafe { to_native::<EchoBinding>(s) }.expect("object");
        assert!(Arc::ptr_eq(&back, &native));
        // The structure is gone with its only reference.
        assert_eq!(Arc::strong_count(&native), 2);
        drop(back);
        assert_eq!(Arc::strong_count(&native), 1);
    }

    #[test]
    fn null_crosses_as_null() {
        assert!(to_c::<EchoBinding>(None).is_null());
        assert!(unsafe { to_native::<EchoBinding>(ptr::null_mut()) }.is_none());
        assert!(unsafe { object::<EchoBinding>(ptr::null_mut()) }.is_none());
    }

    #[test]
    fn foreign_structures_are_not_ours() {
        let mut foreign = CEcho::default();
        assert!(unsafe { object::<EchoBinding>(&mut foreign) }.is_none());
    }

    trait Job {
        fn run(&self) -> i32;
    }

    struct Fixed(i32);

    impl Job for Fixed {
        fn run(&self) -> i32 {
            self.0
        }
    }

    #[repr(C)]
    #[derive(Default)]
    struct CJob {
        base: CBaseScoped,
        run: Option<unsafe extern "C" fn(*mut CJob) -> c_int>,
    }

    unsafe impl Scoped for CJob {}

    unsafe extern "C" fn job_run(s: *mut CJob) -> c_int {
        scoped_object::<JobBinding>(s).map_or(-1, |job| job.run())
    }

    struct JobBinding;

    impl ScopedBinding for JobBinding {
        type Struct = CJob;
        type Native = dyn Job;
        const NAME: &'static str = "Job";

        fn fill(s: &mut CJob) {
            s.run = Some(job_run);
        }
    }

    #[test]
    fn lent_structures_live_only_inside_the_call() {
        let job = Fixed(7);
        let (result, lent) = with_raw::<JobBinding, _>(&job, |s| {
            let result = unsafe { ((*s).run.unwrap())(s) };
            (result, s as usize)
        });
        assert_eq!(result, 7);
        assert!(!registry().contains_key(&lent));
    }
}
