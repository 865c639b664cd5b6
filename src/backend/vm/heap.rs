// Mylox heap and garbage collector
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-23: Initial implementation of Heap with string interning and the
//            intrusive all-objects list; added alloc_string_copy/alloc_string_take
//            so every string in the VM is the canonical interned object.
// 2026-06-26: Full tracing collector:
//            [Precise Marking]: tri-color mark via an explicit gray worklist;
//            roots are the VM value stack, frame closures, open upvalues,
//            globals, the interned "init" string and every function owned by
//            a live compiler (compiler_roots).
//            [Weak Interner]: the string pool does not root its entries;
//            remove_white purges dead keys after tracing, before the sweep.
//            [Allocation-Triggered Collection]: the allocation primitive runs
//            the collector when the stress flag is set or the byte account
//            crosses the threshold; after a sweep the threshold is doubled
//            from the surviving byte count.
// 2026-06-30: Peak-usage tracking (max_allocated) and sweep statistics for
//            GC tuning under the Debug log level.
// 2026-08-01: Allocator exhaustion is fatal: constructors hand out plain
//            pointers again and the allocation primitive aborts the process
//            (after one last-ditch collection) instead of threading a
//            recoverable out-of-memory error through every call site.

use crate::backend::vm::VirtualMachine;
use crate::common::object::{
    BoundMethod, GCObject, HeaderOnly, LoxClass, LoxClosure, LoxFunction, LoxInstance, LoxString,
    LoxValue, NativeFn, NativeFunction, ObjectKind, Upvalue, UpvalueState, fnv1a,
};
use crate::common::table::{Entry, Table};

// 越过这条线视同分配器耗尽，进程直接终止（见 alloc_raw_object）
const HARD_MEMORY_LIMIT: usize = 1024 * 1024 * 512; // 512MB
const INITIAL_THRESHOLD: usize = 1024 * 1024; // 1MB

pub struct Heap {
    pub all_objects: *mut GCObject<HeaderOnly>,
    // weak set: key = interned string, value unused (Nil)
    pub strings: Table,
    pub total_allocated: usize,
    pub threshold: usize,
    // used for debugging and tuning GC parameters, not used in actual GC logic
    pub max_allocated: usize,
    // collect on every growing allocation
    pub stress: bool,
    pub log_gc: bool,
    // root-walk back-reference, null until the VM attaches itself
    pub vm: *const VirtualMachine,
    // functions still owned by live compilers; compilation keeps them
    // reachable here until they land in an enclosing constant pool
    pub compiler_roots: Vec<*mut GCObject<LoxFunction>>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            all_objects: std::ptr::null_mut(),
            strings: Table::new(),
            total_allocated: 0,
            threshold: INITIAL_THRESHOLD,
            max_allocated: 0,
            stress: false,
            log_gc: false,
            vm: std::ptr::null(),
            compiler_roots: Vec::new(),
        }
    }

    // ---- constructors ---------------------------------------------------

    /// Interns a string from borrowed bytes. Returns the existing object
    /// when the contents are already present.
    pub fn alloc_string_copy(&mut self, chars: &str) -> *mut GCObject<LoxString> {
        let hash = fnv1a(chars.as_bytes());
        if let Some(existing) = self.strings.find_string(chars, hash) {
            return existing;
        }
        self.intern_new_string(chars.to_string(), hash)
    }

    /// Interns a string that already owns its buffer (concatenation results).
    /// On a pool hit the incoming buffer is dropped here and the canonical
    /// object is returned instead.
    pub fn alloc_string_take(&mut self, chars: String) -> *mut GCObject<LoxString> {
        let hash = fnv1a(chars.as_bytes());
        if let Some(existing) = self.strings.find_string(&chars, hash) {
            return existing;
        }
        self.intern_new_string(chars, hash)
    }

    fn intern_new_string(&mut self, chars: String, hash: u32) -> *mut GCObject<LoxString> {
        let size = std::mem::size_of::<GCObject<LoxString>>() + chars.capacity();
        let ptr = self.alloc_raw_object(LoxString { chars, hash }, ObjectKind::String, size);
        // 注意弱引用：字符串死掉时 remove_white 会清掉这条
        self.strings.set(ptr, LoxValue::Nil);
        ptr
    }

    pub fn alloc_function(&mut self) -> *mut GCObject<LoxFunction> {
        let size = std::mem::size_of::<GCObject<LoxFunction>>();
        self.alloc_raw_object(LoxFunction::new(), ObjectKind::Function, size)
    }

    pub fn alloc_native(&mut self, function: NativeFn) -> *mut GCObject<NativeFunction> {
        let size = std::mem::size_of::<GCObject<NativeFunction>>();
        self.alloc_raw_object(NativeFunction { function }, ObjectKind::Native, size)
    }

    pub fn alloc_closure(
        &mut self,
        function: *mut GCObject<LoxFunction>,
    ) -> *mut GCObject<LoxClosure> {
        let count = unsafe { (*function).data.upvalue_count };
        // 槽位先填 null，CLOSURE 指令随后逐个捕获；标记阶段会跳过 null
        let upvalues = vec![std::ptr::null_mut(); count];
        let size = std::mem::size_of::<GCObject<LoxClosure>>()
            + count * std::mem::size_of::<*mut GCObject<Upvalue>>();
        self.alloc_raw_object(LoxClosure { function, upvalues }, ObjectKind::Closure, size)
    }

    pub fn alloc_upvalue(&mut self, slot: usize) -> *mut GCObject<Upvalue> {
        let size = std::mem::size_of::<GCObject<Upvalue>>();
        self.alloc_raw_object(
            Upvalue {
                state: UpvalueState::Open(slot),
                next_open: std::ptr::null_mut(),
            },
            ObjectKind::Upvalue,
            size,
        )
    }

    pub fn alloc_class(&mut self, name: *mut GCObject<LoxString>) -> *mut GCObject<LoxClass> {
        let size = std::mem::size_of::<GCObject<LoxClass>>();
        self.alloc_raw_object(
            LoxClass {
                name,
                methods: Table::new(),
            },
            ObjectKind::Class,
            size,
        )
    }

    pub fn alloc_instance(&mut self, class: *mut GCObject<LoxClass>) -> *mut GCObject<LoxInstance> {
        let size = std::mem::size_of::<GCObject<LoxInstance>>();
        self.alloc_raw_object(
            LoxInstance {
                class,
                fields: Table::new(),
            },
            ObjectKind::Instance,
            size,
        )
    }

    pub fn alloc_bound_method(
        &mut self,
        receiver: LoxValue,
        method: *mut GCObject<LoxClosure>,
    ) -> *mut GCObject<BoundMethod> {
        let size = std::mem::size_of::<GCObject<BoundMethod>>();
        self.alloc_raw_object(
            BoundMethod { receiver, method },
            ObjectKind::BoundMethod,
            size,
        )
    }

    // 所有堆对象都经过这一个分配入口，GC 触发和内存记账集中在这里
    fn alloc_raw_object<T>(&mut self, data: T, kind: ObjectKind, size: usize) -> *mut GCObject<T> {
        if self.stress || self.total_allocated + size > self.threshold {
            self.collect_garbage();
        }
        if self.total_allocated + size > HARD_MEMORY_LIMIT {
            // 耗尽不是脚本层错误：最后收集一次，还不够就直接终止进程
            self.collect_garbage();
            if self.total_allocated + size > HARD_MEMORY_LIMIT {
                eprintln!(
                    "[FATAL] OutOfMemoryError: heap exhausted ({} bytes live, {} more requested).",
                    self.total_allocated, size
                );
                std::process::abort();
            }
        }

        let obj = GCObject {
            mark: false,
            kind,
            size,
            next: self.all_objects,
            data,
        };
        let ptr = Box::into_raw(Box::new(obj));
        self.all_objects = ptr as *mut GCObject<HeaderOnly>;

        self.total_allocated += size;
        if self.total_allocated > self.max_allocated {
            self.max_allocated = self.total_allocated;
        }

        ptr
    }

    // ---- collection -----------------------------------------------------

    pub fn collect_garbage(&mut self) {
        let before = self.total_allocated;

        // worklist 自身不走 alloc_raw_object 记账，不会递归触发收集
        let mut gray: Vec<*mut GCObject<HeaderOnly>> = Vec::new();

        // mark roots: the running VM (if attached) plus every function a
        // live compiler still owns
        unsafe {
            if !self.vm.is_null() {
                (*self.vm).mark_roots(&mut gray);
            }
        }
        for &function in &self.compiler_roots {
            mark_object(function as *mut GCObject<HeaderOnly>, &mut gray);
        }

        // trace: blacken until the worklist drains
        while let Some(obj) = gray.pop() {
            blacken_object(obj, &mut gray);
        }

        // the interner must drop dead keys before the sweep frees them
        self.strings.remove_white();

        self.sweep();

        self.threshold = self.total_allocated * 2;

        if self.log_gc {
            println!(
                "[DEBUG] GC cycle finished: {} -> {} bytes (next collection at {}).",
                before, self.total_allocated, self.threshold
            );
        }
    }

    fn sweep(&mut self) {
        unsafe {
            let mut p_prev: *mut GCObject<HeaderOnly> = std::ptr::null_mut();
            let mut p_curr = self.all_objects;

            let mut swept_count = 0usize;
            let mut swept_bytes = 0usize;

            while !p_curr.is_null() {
                if (*p_curr).mark {
                    (*p_curr).mark = false;
                    p_prev = p_curr;
                    p_curr = (*p_curr).next;
                } else {
                    let p_next = (*p_curr).next;
                    if p_prev.is_null() {
                        self.all_objects = p_next;
                    } else {
                        (*p_prev).next = p_next;
                    }

                    swept_count += 1;
                    swept_bytes += (*p_curr).size;
                    self.total_allocated = self.total_allocated.saturating_sub((*p_curr).size);

                    free_object(p_curr);
                    p_curr = p_next;
                }
            }

            if swept_count > 0 && self.log_gc {
                println!(
                    "[DEBUG] Sweep phase finished: reclaimed {} objects, {} bytes released. Current heap: {} bytes.",
                    swept_count, swept_bytes, self.total_allocated
                );
            }
        }
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        // teardown frees everything that is still linked, marked or not
        unsafe {
            let mut p_curr = self.all_objects;
            while !p_curr.is_null() {
                let p_next = (*p_curr).next;
                free_object(p_curr);
                p_curr = p_next;
            }
        }
        self.all_objects = std::ptr::null_mut();
        self.strings = Table::new();
    }
}

// ---- marking helpers (also used by VirtualMachine::mark_roots) ----------

pub fn mark_object(ptr: *mut GCObject<HeaderOnly>, gray: &mut Vec<*mut GCObject<HeaderOnly>>) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        if (*ptr).mark {
            return;
        }
        (*ptr).mark = true;
    }
    gray.push(ptr);
}

pub fn mark_value(value: &LoxValue, gray: &mut Vec<*mut GCObject<HeaderOnly>>) {
    mark_object(value.header_ptr(), gray);
}

pub fn mark_table(entries: &[Entry], gray: &mut Vec<*mut GCObject<HeaderOnly>>) {
    for entry in entries {
        mark_object(entry.key as *mut GCObject<HeaderOnly>, gray);
        mark_value(&entry.value, gray);
    }
}

// blacken = mark every object this one references
fn blacken_object(ptr: *mut GCObject<HeaderOnly>, gray: &mut Vec<*mut GCObject<HeaderOnly>>) {
    unsafe {
        match (*ptr).kind {
            // leaves: nothing to trace
            ObjectKind::String | ObjectKind::Native => {}
            ObjectKind::Function => {
                let function = &(*(ptr as *mut GCObject<LoxFunction>)).data;
                mark_object(function.name as *mut GCObject<HeaderOnly>, gray);
                for value in &function.chunk.constants {
                    mark_value(value, gray);
                }
            }
            ObjectKind::Closure => {
                let closure = &(*(ptr as *mut GCObject<LoxClosure>)).data;
                mark_object(closure.function as *mut GCObject<HeaderOnly>, gray);
                for &upvalue in &closure.upvalues {
                    // null while the CLOSURE instruction is still capturing
                    mark_object(upvalue as *mut GCObject<HeaderOnly>, gray);
                }
            }
            ObjectKind::Upvalue => {
                // open upvalue 指向的栈槽本身就是根，这里只管 closed 值
                if let UpvalueState::Closed(value) = &(*(ptr as *mut GCObject<Upvalue>)).data.state
                {
                    mark_value(value, gray);
                }
            }
            ObjectKind::Class => {
                let class = &(*(ptr as *mut GCObject<LoxClass>)).data;
                mark_object(class.name as *mut GCObject<HeaderOnly>, gray);
                mark_table(&class.methods.entries, gray);
            }
            ObjectKind::Instance => {
                let instance = &(*(ptr as *mut GCObject<LoxInstance>)).data;
                mark_object(instance.class as *mut GCObject<HeaderOnly>, gray);
                mark_table(&instance.fields.entries, gray);
            }
            ObjectKind::BoundMethod => {
                let bound = &(*(ptr as *mut GCObject<BoundMethod>)).data;
                mark_value(&bound.receiver, gray);
                mark_object(bound.method as *mut GCObject<HeaderOnly>, gray);
            }
        }
    }
}

// sweep/teardown 都从这里走，按 kind 还原成 Box 让 Drop 释放内部容器
unsafe fn free_object(ptr: *mut GCObject<HeaderOnly>) {
    unsafe {
        match (*ptr).kind {
            ObjectKind::String => {
                drop(Box::from_raw(ptr as *mut GCObject<LoxString>));
            }
            ObjectKind::Function => {
                drop(Box::from_raw(ptr as *mut GCObject<LoxFunction>));
            }
            ObjectKind::Native => {
                drop(Box::from_raw(ptr as *mut GCObject<NativeFunction>));
            }
            ObjectKind::Closure => {
                drop(Box::from_raw(ptr as *mut GCObject<LoxClosure>));
            }
            ObjectKind::Upvalue => {
                drop(Box::from_raw(ptr as *mut GCObject<Upvalue>));
            }
            ObjectKind::Class => {
                drop(Box::from_raw(ptr as *mut GCObject<LoxClass>));
            }
            ObjectKind::Instance => {
                drop(Box::from_raw(ptr as *mut GCObject<LoxInstance>));
            }
            ObjectKind::BoundMethod => {
                drop(Box::from_raw(ptr as *mut GCObject<BoundMethod>));
            }
        }
    }
}
