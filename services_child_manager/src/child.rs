//! The per-child aggregate
//!
//! A [`Child`] owns everything the manager created on behalf of one task.
//! All mutable state sits behind one lock, held for the duration of a single
//! operation. Kernel calls made under the lock never block; the only
//! blocking wait (a join) happens in the manager after the lock is gone.
//!
//! A child is shared through `Arc`. The registry holds one reference and
//! every in-flight call holds another; dropping the last one runs the
//! teardown and gives the child id back.

use crate::child_info::ChildInfo;
use crate::context::{IdPool, Platform};
use crate::lifecycle::{ChildState, TeardownPhase};
use crate::sched::{
    JoinItem, JoinOutcome, MainThread, SchedEntity, ThreadExit, ThreadGrant, MAIN_THREAD_NAME,
};
use crate::session::SessionTable;
use crate::ChildError;
use core_types::{
    checked_page_align_up, CapSel, ChildId, CpuId, MemoryPerms, Qpd, RegionKind, ThreadId,
    PAGE_SIZE,
};
use ipc::ClientSession;
use parking_lot::Mutex;
use resources::{
    GsiBitmap, PortManager, PortRange, Region, RegionList, ResourceError, ResourceKind,
};
use services_registry::Service;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Where and how a child starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartInfo {
    /// Entry point of the main thread
    pub entry: usize,
    /// Thread id the child uses for its main thread
    pub main_thread: ThreadId,
    pub cpu: CpuId,
    pub qpd: Qpd,
}

/// One service portal per CPU, badged with the child id
#[derive(Debug, Clone, Copy)]
struct PortalBlock {
    base: CapSel,
    reserved: u64,
    created: u64,
}

#[derive(Debug)]
struct ChildInner {
    state: ChildState,
    started: bool,
    address_space: Option<CapSel>,
    main_thread: Option<Arc<MainThread>>,
    portals: Option<PortalBlock>,
    regions: RegionList,
    ports: PortManager,
    gsis: GsiBitmap,
    /// Selector block; GSI `n` is signalled through the semaphore at `gsi_caps + n`
    gsi_caps: Option<CapSel>,
    sched_entities: BTreeMap<ThreadId, SchedEntity>,
    sessions: SessionTable,
    joins: BTreeMap<ThreadId, JoinItem>,
    phase: Option<TeardownPhase>,
}

/// A child task
pub struct Child {
    id: ChildId,
    cmdline: String,
    platform: Arc<Platform>,
    ids: Arc<IdPool>,
    inner: Mutex<ChildInner>,
}

impl Child {
    /// Creates a child in the `Created` state and reserves its GSI
    /// selector block.
    pub(crate) fn new(
        id: ChildId,
        cmdline: String,
        platform: Arc<Platform>,
        ids: Arc<IdPool>,
    ) -> Result<Self, ChildError> {
        let config = platform.config();
        let gsi_caps = match config.max_gsis {
            0 => None,
            n => Some(platform.caps().allocate(n as u64)?),
        };
        let inner = ChildInner {
            state: ChildState::Created,
            started: false,
            address_space: None,
            main_thread: None,
            portals: None,
            regions: RegionList::new(config.child_va_base, config.child_va_limit),
            ports: PortManager::new(),
            gsis: GsiBitmap::new(config.max_gsis),
            gsi_caps,
            sched_entities: BTreeMap::new(),
            sessions: SessionTable::new(),
            joins: BTreeMap::new(),
            phase: None,
        };
        Ok(Self {
            id,
            cmdline,
            platform,
            ids,
            inner: Mutex::new(inner),
        })
    }

    pub fn id(&self) -> ChildId {
        self.id
    }

    pub fn cmdline(&self) -> &str {
        &self.cmdline
    }

    pub fn state(&self) -> ChildState {
        self.inner.lock().state
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    pub fn address_space(&self) -> Option<CapSel> {
        self.inner.lock().address_space
    }

    pub fn main_thread(&self) -> Option<Arc<MainThread>> {
        self.inner.lock().main_thread.clone()
    }

    /// Creates the address space, portals and main thread.
    ///
    /// Whatever was acquired before a failure stays recorded in the child
    /// and is released by its teardown.
    pub fn start(&self, info: StartInfo) -> Result<(), ChildError> {
        let mut inner = self.inner.lock();
        if inner.state != ChildState::Created {
            return Err(ChildError::AlreadyStarted { child: self.id });
        }
        self.check_cpu(info.cpu)?;
        let kernel = self.platform.kernel();
        let caps = self.platform.caps();

        let pd = caps.allocate(1)?;
        if let Err(err) = kernel.create_pd(pd, &self.cmdline) {
            caps.free(pd, 1);
            return Err(err.into());
        }
        inner.address_space = Some(pd);
        inner.started = true;
        inner.state = ChildState::Started;

        let cpus = self.platform.config().cpu_count as u64;
        let mut block = PortalBlock {
            base: caps.allocate(cpus)?,
            reserved: cpus,
            created: 0,
        };
        let created = (0..cpus).try_for_each(|cpu| {
            kernel.create_pt(block.base.offset(cpu), CpuId(cpu as usize), self.id.0 as u64)?;
            block.created += 1;
            Ok::<(), ChildError>(())
        });
        inner.portals = Some(block);
        created?;

        let config = self.platform.config();
        inner.map_region(
            &self.platform,
            PAGE_SIZE,
            MemoryPerms::read_only(),
            RegionKind::Hip,
            false,
        )?;
        let stack = inner.map_region(
            &self.platform,
            config.stack_size,
            MemoryPerms::read_write(),
            RegionKind::Stack,
            true,
        )?;
        let utcb = inner.map_region(
            &self.platform,
            config.utcb_size,
            MemoryPerms::read_write(),
            RegionKind::Utcb,
            false,
        )?;

        let ec = caps.allocate(1)?;
        if let Err(err) = kernel.create_ec(ec, pd, info.cpu, utcb.addr) {
            caps.free(ec, 1);
            return Err(err.into());
        }
        inner.main_thread = Some(Arc::new(MainThread {
            thread_id: info.main_thread,
            ec,
            cpu: info.cpu,
            entry: info.entry,
            stack: stack.addr,
            utcb: utcb.addr,
        }));

        let sc = create_sc(&self.platform, ec, pd, info.cpu, info.qpd)?;
        inner.sched_entities.insert(
            info.main_thread,
            SchedEntity {
                thread_id: info.main_thread,
                name: MAIN_THREAD_NAME.to_string(),
                cpu: info.cpu,
                qpd: info.qpd,
                sc,
            },
        );
        inner.state = ChildState::Running;
        log::info!(
            "{} started: entry={:#x} main={} on {}",
            self.id,
            info.entry,
            info.main_thread,
            info.cpu
        );
        Ok(())
    }

    /// Registers a thread the child created and makes it runnable.
    ///
    /// Allocates the thread's stack and UTCB, then creates a scheduling
    /// context for `ec` on `cpu`. Nothing is kept if any step fails.
    pub fn create_thread(
        &self,
        ec: CapSel,
        name: &str,
        thread_id: ThreadId,
        cpu: CpuId,
        qpd: Qpd,
    ) -> Result<ThreadGrant, ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;
        if inner.sched_entities.contains_key(&thread_id) {
            return Err(ChildError::DuplicateThread {
                child: self.id,
                thread: thread_id,
            });
        }
        self.check_cpu(cpu)?;
        let config = self.platform.config();
        config
            .quota
            .check(ResourceKind::Threads, inner.sched_entities.len())?;
        let pd = inner
            .address_space
            .ok_or(ChildError::NotStarted { child: self.id })?;

        let stack = inner.map_region(
            &self.platform,
            config.stack_size,
            MemoryPerms::read_write(),
            RegionKind::Stack,
            true,
        )?;
        let utcb = match inner.map_region(
            &self.platform,
            config.utcb_size,
            MemoryPerms::read_write(),
            RegionKind::Utcb,
            false,
        ) {
            Ok(utcb) => utcb,
            Err(err) => {
                inner.unmap_region(&self.platform, stack.addr);
                return Err(err);
            }
        };
        let sc = match create_sc(&self.platform, ec, pd, cpu, qpd) {
            Ok(sc) => sc,
            Err(err) => {
                inner.unmap_region(&self.platform, utcb.addr);
                inner.unmap_region(&self.platform, stack.addr);
                return Err(err);
            }
        };

        inner.sched_entities.insert(
            thread_id,
            SchedEntity {
                thread_id,
                name: name.to_string(),
                cpu,
                qpd,
                sc,
            },
        );
        log::debug!("{}: {} '{}' announced on {}", self.id, thread_id, name, cpu);
        Ok(ThreadGrant {
            sc,
            stack: stack.addr,
            utcb: utcb.addr,
        })
    }

    /// Records that `signal` should be raised when `thread_id` ends.
    ///
    /// If the thread is already gone the signal is raised right away. Only
    /// one join may be pending per thread.
    pub fn join_thread(&self, thread_id: ThreadId, signal: CapSel) -> Result<JoinOutcome, ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;
        if !inner.sched_entities.contains_key(&thread_id) {
            self.platform.kernel().sm_up(signal)?;
            return Ok(JoinOutcome::Signaled);
        }
        if inner.joins.contains_key(&thread_id) {
            return Err(ChildError::JoinPending {
                child: self.id,
                thread: thread_id,
            });
        }
        inner.joins.insert(thread_id, JoinItem { thread_id, signal });
        Ok(JoinOutcome::Pending)
    }

    /// Drops the pending join on `thread_id` if it still waits on `signal`.
    ///
    /// Used when the waiter could not block on its semaphore. Returns false
    /// if the join was already consumed.
    pub fn cancel_join(&self, thread_id: ThreadId, signal: CapSel) -> bool {
        let mut inner = self.inner.lock();
        match inner.joins.get(&thread_id) {
            Some(join) if join.signal == signal => {
                inner.joins.remove(&thread_id);
                log::debug!("{}: join on {} cancelled", self.id, thread_id);
                true
            }
            _ => false,
        }
    }

    /// Removes a finished thread and releases its scheduling context,
    /// stack and UTCB, then wakes its joiner.
    ///
    /// Terminating an unknown thread does nothing. When the main thread
    /// ends the child moves to `Terminating`.
    pub fn term_thread(
        &self,
        thread_id: ThreadId,
        stack: usize,
        utcb: usize,
    ) -> Result<ThreadExit, ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;
        let Some(se) = inner.sched_entities.remove(&thread_id) else {
            return Ok(ThreadExit::Thread);
        };
        self.platform.release_sel(se.sc);
        for (addr, kind) in [(stack, RegionKind::Stack), (utcb, RegionKind::Utcb)] {
            if inner.regions.get(addr).map_or(false, |r| r.kind == kind) {
                inner.unmap_region(&self.platform, addr);
            }
        }
        if let Some(join) = inner.joins.remove(&thread_id) {
            signal_join(&self.platform, self.id, join);
        }
        log::debug!("{}: {} '{}' terminated", self.id, thread_id, se.name);

        let is_main = inner
            .main_thread
            .as_ref()
            .map_or(false, |main| main.thread_id == thread_id);
        if is_main {
            inner.state = ChildState::Terminating;
            log::info!("{}: main thread exited", self.id);
            return Ok(ThreadExit::Main);
        }
        Ok(ThreadExit::Thread)
    }

    /// Opens a session with a service.
    ///
    /// `resolved` skips the registry lookup when the caller already knows
    /// the service; the permission check always runs.
    pub fn open_session(
        &self,
        name: &str,
        args: &str,
        resolved: Option<Service>,
    ) -> Result<CapSel, ChildError> {
        let services = self.platform.services();
        let service = match resolved {
            Some(service) => service,
            None => services
                .resolve(name)
                .ok_or_else(|| ChildError::ServiceNotFound {
                    child: self.id,
                    service: name.to_string(),
                })?,
        };
        if !services.permitted(self.id, &self.cmdline, &service) {
            log::warn!("{}: session with '{}' refused", self.id, service.name);
            return Err(ChildError::PermissionDenied {
                child: self.id,
                service: service.name,
            });
        }

        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        self.platform
            .config()
            .quota
            .check(ResourceKind::Sessions, inner.sessions.len())?;
        let caps = self.platform.caps();
        let handle = caps.allocate(1)?;
        if let Err(err) = self.platform.kernel().open_session(handle, service.portal, args) {
            caps.free(handle, 1);
            return Err(err.into());
        }
        let session = ClientSession::new(handle, service.name, service.id, args);
        log::debug!("{}: opened {}", self.id, session);
        let inserted = inner.sessions.insert(session);
        assert!(inserted, "{}: session handle {} reused", self.id, handle);
        Ok(handle)
    }

    /// Closes a session; a handle can be closed only once.
    pub fn close_session(&self, handle: CapSel) -> Result<(), ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        let session = inner
            .sessions
            .remove(handle)
            .ok_or(ChildError::SessionNotFound {
                child: self.id,
                handle,
            })?;
        self.platform.release_sel(session.handle);
        log::debug!("{}: closed {}", self.id, session);
        Ok(())
    }

    /// Maps `size` bytes of fresh memory into the child.
    pub fn alloc_region(&self, size: usize, perms: MemoryPerms) -> Result<Region, ChildError> {
        if size == 0 {
            return Err(ResourceError::OutOfRange {
                resource: ResourceKind::VirtualMemory,
                value: 0,
            }
            .into());
        }
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        inner.map_region(&self.platform, size, perms, RegionKind::Data, true)
    }

    /// Unmaps a region obtained from [`Child::alloc_region`].
    pub fn free_region(&self, addr: usize) -> Result<(), ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        match inner.regions.get(addr) {
            Some(region) if region.kind == RegionKind::Data => {
                inner.unmap_region(&self.platform, addr);
                Ok(())
            }
            _ => Err(ChildError::RegionNotFound {
                child: self.id,
                addr,
            }),
        }
    }

    /// Grants the IO ports `base..base + count`.
    pub fn alloc_io_ports(&self, base: u32, count: u32) -> Result<(), ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        if count == 0 {
            return Err(ResourceError::OutOfRange {
                resource: ResourceKind::IoPorts,
                value: base as u64,
            }
            .into());
        }
        let range = PortRange::new(base, count);
        self.platform.ports().allocate(range)?;
        inner.ports.insert(range);
        log::debug!("{}: IO ports {}", self.id, range);
        Ok(())
    }

    /// Returns a port range; it must match a granted range exactly.
    pub fn free_io_ports(&self, base: u32, count: u32) -> Result<(), ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        let range = PortRange::new(base, count);
        if !inner.ports.remove(range) {
            return Err(ChildError::PortsNotHeld {
                child: self.id,
                base,
                count,
            });
        }
        self.platform.ports().release(range);
        Ok(())
    }

    /// Assigns an interrupt line, `gsi` or the lowest free one, and creates
    /// the semaphore it is delivered through.
    pub fn alloc_gsi(&self, gsi: Option<u32>) -> Result<(u32, CapSel), ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        let block = inner.gsi_caps.ok_or(ResourceError::Exhausted {
            resource: ResourceKind::Gsis,
            requested: 1,
            available: 0,
        })?;
        let gsis = self.platform.gsis();
        let gsi = match gsi {
            Some(gsi) => {
                gsis.allocate(gsi)?;
                gsi
            }
            None => gsis.allocate_any()?,
        };
        let sm = block.offset(gsi as u64);
        if let Err(err) = self.platform.kernel().create_sm(sm, 0) {
            gsis.release(gsi);
            return Err(err.into());
        }
        inner.gsis.set(gsi);
        log::debug!("{}: GSI {} via {}", self.id, gsi, sm);
        Ok((gsi, sm))
    }

    /// Gives an interrupt line back.
    pub fn release_gsi(&self, gsi: u32) -> Result<(), ChildError> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        if !inner.gsis.clear(gsi) {
            return Err(ChildError::GsiNotHeld {
                child: self.id,
                gsi,
            });
        }
        if let Some(block) = inner.gsi_caps {
            self.platform.revoke(block.offset(gsi as u64));
        }
        self.platform.gsis().release(gsi);
        Ok(())
    }

    /// Scheduling entity of `thread_id`
    pub fn thread_by_id(&self, thread_id: ThreadId) -> Option<SchedEntity> {
        self.inner.lock().sched_entities.get(&thread_id).cloned()
    }

    /// Scheduling entity whose scheduling context is `sc`
    pub fn thread_by_cap(&self, sc: CapSel) -> Option<SchedEntity> {
        self.inner
            .lock()
            .sched_entities
            .values()
            .find(|se| se.sc == sc)
            .cloned()
    }

    /// All scheduling entities, ordered by thread id
    pub fn threads(&self) -> Vec<SchedEntity> {
        self.inner.lock().sched_entities.values().cloned().collect()
    }

    pub fn session(&self, handle: CapSel) -> Option<ClientSession> {
        self.inner.lock().sessions.get(handle).cloned()
    }

    pub fn sessions(&self) -> Vec<ClientSession> {
        self.inner.lock().sessions.iter().cloned().collect()
    }

    pub fn regions(&self) -> Vec<Region> {
        self.inner.lock().regions.iter().copied().collect()
    }

    pub fn port_ranges(&self) -> Vec<PortRange> {
        self.inner.lock().ports.ranges()
    }

    pub fn gsis(&self) -> Vec<u32> {
        self.inner.lock().gsis.iter().collect()
    }

    /// Number of joins waiting for a thread to end
    pub fn pending_joins(&self) -> usize {
        self.inner.lock().joins.len()
    }

    /// Teardown phase reached so far, if teardown has begun
    pub fn teardown_phase(&self) -> Option<TeardownPhase> {
        self.inner.lock().phase
    }

    /// Snapshot for diagnostics
    pub fn info(&self) -> ChildInfo {
        let inner = self.inner.lock();
        ChildInfo {
            id: self.id,
            cmdline: self.cmdline.clone(),
            state: inner.state,
            threads: inner.sched_entities.len(),
            sessions: inner.sessions.len(),
            regions: inner.regions.len(),
            mapped_bytes: inner.regions.mapped_bytes(),
            port_ranges: inner.ports.len(),
            gsis: inner.gsis.count(),
            pending_joins: inner.joins.len(),
        }
    }

    /// Multi-line description of every table, for logs
    pub fn dump(&self) -> String {
        let info = self.info();
        let inner = self.inner.lock();
        let mut out = format!("{}\n", info);
        for se in inner.sched_entities.values() {
            let _ = writeln!(out, "  thread  {}", se);
        }
        for session in inner.sessions.iter() {
            let _ = writeln!(out, "  session {}", session);
        }
        for region in inner.regions.iter() {
            let _ = writeln!(out, "  region  {}", region);
        }
        for range in inner.ports.ranges() {
            let _ = writeln!(out, "  ports   {}", range);
        }
        for gsi in inner.gsis.iter() {
            let _ = writeln!(out, "  gsi     {}", gsi);
        }
        out
    }

    /// Releases every resource of the child in the fixed teardown order.
    ///
    /// Idempotent; also runs when the last reference is dropped.
    pub fn teardown(&self) {
        self.inner.lock().teardown(&self.platform, self.id);
    }

    fn ensure_running(&self, inner: &ChildInner) -> Result<(), ChildError> {
        match inner.state {
            ChildState::Running => Ok(()),
            ChildState::Created => Err(ChildError::NotStarted { child: self.id }),
            state => Err(ChildError::NotRunning {
                child: self.id,
                state,
            }),
        }
    }

    fn ensure_active(&self, inner: &ChildInner) -> Result<(), ChildError> {
        match inner.state {
            state if state.is_active() => Ok(()),
            ChildState::Created => Err(ChildError::NotStarted { child: self.id }),
            state => Err(ChildError::NotRunning {
                child: self.id,
                state,
            }),
        }
    }

    fn check_cpu(&self, cpu: CpuId) -> Result<(), ChildError> {
        if cpu.0 >= self.platform.config().cpu_count {
            return Err(ChildError::InvalidCpu {
                child: self.id,
                cpu,
            });
        }
        Ok(())
    }
}

impl Drop for Child {
    fn drop(&mut self) {
        let platform = Arc::clone(&self.platform);
        self.inner.get_mut().teardown(&platform, self.id);
        self.ids.release(self.id);
        log::info!("{} destroyed", self.id);
    }
}

impl std::fmt::Display for Child {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.info())
    }
}

fn create_sc(
    platform: &Platform,
    ec: CapSel,
    pd: CapSel,
    cpu: CpuId,
    qpd: Qpd,
) -> Result<CapSel, ChildError> {
    let caps = platform.caps();
    let sc = caps.allocate(1)?;
    if let Err(err) = platform.kernel().create_sc(sc, ec, pd, cpu, qpd) {
        caps.free(sc, 1);
        return Err(err.into());
    }
    Ok(sc)
}

/// The joiner may already have destroyed its semaphore; that only hurts
/// the joiner, so it is logged and otherwise ignored.
fn signal_join(platform: &Platform, id: ChildId, join: JoinItem) {
    if let Err(err) = platform.kernel().sm_up(join.signal) {
        log::warn!(
            "{}: join signal {} for {} lost: {}",
            id,
            join.signal,
            join.thread_id,
            err
        );
    }
}

impl ChildInner {
    fn map_region(
        &mut self,
        platform: &Platform,
        size: usize,
        perms: MemoryPerms,
        kind: RegionKind,
        backed: bool,
    ) -> Result<Region, ChildError> {
        platform
            .config()
            .quota
            .check(ResourceKind::Regions, self.regions.len())?;
        let size = checked_page_align_up(size).ok_or(ResourceError::Exhausted {
            resource: ResourceKind::VirtualMemory,
            requested: size as u64,
            available: self.regions.free_bytes() as u64,
        })?;
        let addr = self.regions.find_free(size)?;
        let mut region = Region::new(addr, size, perms, kind);
        if backed {
            let caps = platform.caps();
            let sel = caps.allocate(1)?;
            if let Err(err) = platform.kernel().create_memory(sel, size) {
                caps.free(sel, 1);
                return Err(err.into());
            }
            region = region.with_backing(sel);
        }
        if let Err(err) = self.regions.insert(region) {
            if let Some(sel) = region.backing {
                platform.release_sel(sel);
            }
            return Err(err.into());
        }
        Ok(region)
    }

    fn unmap_region(&mut self, platform: &Platform, addr: usize) -> Option<Region> {
        let region = self.regions.remove(addr)?;
        if let Some(sel) = region.backing {
            platform.release_sel(sel);
        }
        Some(region)
    }

    fn teardown(&mut self, platform: &Platform, id: ChildId) {
        let mut phase = match self.phase {
            Some(TeardownPhase::Done) => return,
            Some(phase) => phase,
            None => TeardownPhase::Portals,
        };
        while phase != TeardownPhase::Done {
            self.phase = Some(phase);
            log::debug!("{}: releasing {}", id, phase.as_str());
            match phase {
                TeardownPhase::Portals => self.release_portals(platform),
                TeardownPhase::Threads => self.release_threads(platform, id),
                TeardownPhase::Regions => self.release_regions(platform),
                TeardownPhase::Ports => self.release_ports(platform),
                TeardownPhase::Gsis => self.release_gsis(platform),
                TeardownPhase::Sessions => self.release_sessions(platform),
                TeardownPhase::AddressSpace => self.release_address_space(platform),
                TeardownPhase::Done => {}
            }
            phase = phase.next();
        }
        self.phase = Some(TeardownPhase::Done);
        self.state = ChildState::Destroyed;
    }

    fn release_portals(&mut self, platform: &Platform) {
        if let Some(block) = self.portals.take() {
            for n in 0..block.created {
                platform.revoke(block.base.offset(n));
            }
            platform.caps().free(block.base, block.reserved);
        }
    }

    fn release_threads(&mut self, platform: &Platform, id: ChildId) {
        for (thread_id, se) in std::mem::take(&mut self.sched_entities) {
            platform.release_sel(se.sc);
            if let Some(join) = self.joins.remove(&thread_id) {
                signal_join(platform, id, join);
            }
        }
        for (_, join) in std::mem::take(&mut self.joins) {
            signal_join(platform, id, join);
        }
        if let Some(main) = self.main_thread.take() {
            platform.release_sel(main.ec);
        }
    }

    fn release_regions(&mut self, platform: &Platform) {
        for region in self.regions.drain() {
            if let Some(sel) = region.backing {
                platform.release_sel(sel);
            }
        }
    }

    fn release_ports(&mut self, platform: &Platform) {
        for range in self.ports.drain() {
            platform.ports().release(range);
        }
    }

    fn release_gsis(&mut self, platform: &Platform) {
        let held: Vec<u32> = self.gsis.iter().collect();
        if let Some(block) = self.gsi_caps.take() {
            for gsi in held {
                platform.revoke(block.offset(gsi as u64));
                platform.gsis().release(gsi);
                self.gsis.clear(gsi);
            }
            platform
                .caps()
                .free(block, self.gsis.capacity() as u64);
        }
    }

    fn release_sessions(&mut self, platform: &Platform) {
        for session in self.sessions.drain() {
            platform.release_sel(session.handle);
        }
    }

    fn release_address_space(&mut self, platform: &Platform) {
        if let Some(pd) = self.address_space.take() {
            platform.release_sel(pd);
        }
    }
}
