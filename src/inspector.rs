//! Configured entry point over one memory image.

use std::time::Duration;

use corewalk_core::{
    Address, AddressSpace, Arch, ContainerLayout, Fault, ListNodeLayout, RbRootLayout,
    TreeNodeLayout, TreeReport, UtsnameLayout, WalkReport,
};
use corewalk_list::ListWalkOptions;
use corewalk_percpu::{PerCpuRegion, PerCpuResolver};
use corewalk_rbtree::TreeWalkOptions;
use corewalk_sys::{KernelConfig, SysError, TickClock, UtsSnapshot};

use crate::config::{Config, ConfigError};

/// Runs the walkers over one image with the limits from a [`Config`].
///
/// Layouts default to the stock kernel structures for the image's
/// architecture.
#[derive(Debug, Clone)]
pub struct Inspector<S> {
    space: S,
    arch: Arch,
    config: Config,
}

impl<S: AddressSpace> Inspector<S> {
    pub fn new(space: S, arch: Arch, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { space, arch, config })
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// List walk options carrying the configured limits.
    pub fn list_options(&self) -> ListWalkOptions {
        ListWalkOptions::new(self.config.limits.max_list_nodes)
            .exact_cycles(self.config.limits.exact_cycles)
    }

    /// Walk the `struct list_head` list anchored at `head`.
    pub fn walk_list(&self, head: Address) -> WalkReport {
        self.walk_list_with(head, &self.list_options())
    }

    pub fn walk_list_entries(&self, head: Address, container: ContainerLayout) -> WalkReport {
        self.walk_list_with(head, &self.list_options().container(container))
    }

    pub fn walk_list_with(&self, head: Address, options: &ListWalkOptions) -> WalkReport {
        corewalk_list::walk_list_with(
            &self.space,
            head,
            &ListNodeLayout::list_head(self.arch),
            options,
        )
    }

    /// Walk the `struct rb_node` tree whose root node is at `root`.
    pub fn walk_tree(&self, root: Address) -> TreeReport {
        self.walk_tree_with(root, &TreeWalkOptions::new())
    }

    pub fn walk_tree_entries(&self, root: Address, container: ContainerLayout) -> TreeReport {
        self.walk_tree_with(root, &TreeWalkOptions::new().container(container))
    }

    pub fn walk_tree_with(&self, root: Address, options: &TreeWalkOptions) -> TreeReport {
        corewalk_rbtree::walk_tree_with(
            &self.space,
            root,
            &TreeNodeLayout::rb_node(self.arch),
            options,
        )
    }

    /// Walk the tree anchored by the `struct rb_root` at `rb_root`.
    pub fn walk_rb_root(&self, rb_root: Address) -> TreeReport {
        self.walk_rb_root_with(rb_root, &TreeWalkOptions::new())
    }

    pub fn walk_rb_root_with(&self, rb_root: Address, options: &TreeWalkOptions) -> TreeReport {
        corewalk_rbtree::walk_rb_root_with(
            &self.space,
            rb_root,
            &RbRootLayout::rb_root(self.arch),
            &TreeNodeLayout::rb_node(self.arch),
            options,
        )
    }

    /// Load the per-CPU offset table of `table_len` entries at `table`.
    ///
    /// Resolution is limited to the configured CPU count, if any.
    pub fn percpu(
        &self,
        region: PerCpuRegion,
        table: Address,
        table_len: usize,
    ) -> Result<PerCpuResolver, Fault> {
        let resolver = PerCpuResolver::load(&self.space, region, table, table_len, self.arch)?;
        Ok(match self.config.percpu.nr_cpus {
            Some(nr_cpus) => resolver.with_nr_cpus(nr_cpus),
            None => resolver,
        })
    }

    /// Decode the `struct new_utsname` at `address`.
    pub fn utsname(&self, address: Address) -> Result<UtsSnapshot, Fault> {
        corewalk_sys::extract_utsname(&self.space, address, &UtsnameLayout::new_utsname())
    }

    /// Tick clock for the configured `CONFIG_HZ`.
    pub fn tick_clock(&self) -> Result<TickClock, SysError> {
        if self.config.kernel.adjust_initial_jiffies {
            TickClock::jiffies_64(self.config.kernel.hz)
        } else {
            TickClock::new(self.config.kernel.hz)
        }
    }

    /// Time since boot, from the tick counter at `jiffies`.
    pub fn uptime(&self, jiffies: Address) -> Result<Duration, SysError> {
        let clock = self.tick_clock()?;
        let ticks = corewalk_sys::extract_tick_counter(&self.space, jiffies, self.arch.endian())?;
        Ok(clock.uptime(ticks))
    }

    /// The 1, 5 and 15 minute load averages from `avenrun`.
    pub fn loadavg(&self, avenrun: Address) -> Result<[f64; 3], Fault> {
        corewalk_sys::extract_loadavg(&self.space, avenrun, self.arch)
    }

    /// Decompress the embedded kernel configuration.
    pub fn kernel_config(&self, address: Address, len: usize) -> Result<KernelConfig, SysError> {
        corewalk_sys::extract_ikconfig(&self.space, address, len)
    }
}

#[cfg(test)]
mod tests {
    use corewalk_core::Status;
    use corewalk_fixtures::{lists, percpu, sys, trees, Fixture};

    use super::*;
    use crate::config::{KernelSettings, LimitsConfig, PerCpuConfig};

    fn inspector(fixture: Fixture, config: Config) -> Inspector<Fixture> {
        let arch = fixture.arch();
        Inspector::new(fixture, arch, config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let fixture = lists::list_fixture(Arch::X86_64).unwrap();
        let config = Config {
            limits: LimitsConfig {
                max_list_nodes: 0,
                exact_cycles: true,
            },
            ..Config::default()
        };
        assert!(matches!(
            Inspector::new(fixture, Arch::X86_64, config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_walk_list_with_default_limits() {
        let fixture = lists::list_fixture(Arch::X86_64).unwrap();
        let head = fixture.symbol("normal_head").unwrap();
        let inspector = inspector(fixture, Config::for_test());

        let report = inspector.walk_list(head);
        assert_eq!(report.status(), Status::Consistent);
        assert_eq!(report.len(), lists::LIST_LEN);
    }

    #[test]
    fn test_node_budget_comes_from_config() {
        let fixture = lists::list_fixture(Arch::X86_64).unwrap();
        let head = fixture.symbol("normal_head").unwrap();
        let config = Config {
            limits: LimitsConfig {
                max_list_nodes: 3,
                exact_cycles: true,
            },
            ..Config::default()
        };
        let inspector = inspector(fixture, config);

        let report = inspector.walk_list(head);
        assert!(matches!(report.fault, Some(Fault::Cycle { visited: 3, .. })));
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn test_walk_containers() {
        let fixture = lists::list_fixture(Arch::PPC64).unwrap();
        let head = fixture.symbol("good_container_list").unwrap();
        let nodes = fixture.symbol("good_containers").unwrap();
        let inspector = inspector(fixture, Config::for_test());

        let report = inspector.walk_list_entries(head, lists::container_layout(Arch::PPC64));
        assert!(report.is_consistent());
        assert_eq!(report.containers()[0], nodes);
    }

    #[test]
    fn test_walk_rb_root_and_node() {
        let fixture = trees::rbtree_fixture(Arch::X86_64).unwrap();
        let root = fixture.symbol("full_binary_tree_root").unwrap();
        let first = fixture.symbol("full_binary_tree").unwrap();
        let inspector = inspector(fixture, Config::for_test());

        let from_root = inspector.walk_rb_root(root);
        assert!(from_root.is_consistent());
        assert_eq!(from_root.black_height, Some(2));
        assert_eq!(from_root.len(), 7);

        let member = trees::number_node_layout(Arch::X86_64).member_offset;
        let from_node = inspector.walk_tree(Address(first.0 + member as u64));
        assert_eq!(from_node.nodes(), from_root.nodes());
    }

    #[test]
    fn test_percpu_limited_by_config() {
        let fixture = percpu::percpu_fixture(Arch::X86_64).unwrap();
        let start = fixture.symbol("__per_cpu_start").unwrap();
        let end = fixture.symbol("__per_cpu_end").unwrap();
        let table = fixture.symbol("__per_cpu_offset").unwrap();
        let config = Config {
            percpu: PerCpuConfig { nr_cpus: Some(4) },
            ..Config::default()
        };
        let inspector = inspector(fixture, config);

        let resolver = inspector
            .percpu(PerCpuRegion::from_bounds(start, end), table, percpu::NR_CPUS)
            .unwrap();
        assert_eq!(resolver.nr_cpus(), 4);
        assert!(matches!(
            resolver.resolve(start, 4),
            Err(Fault::CpuIndexOutOfRange { cpu: 4, nr_cpus: 4 })
        ));
    }

    #[test]
    fn test_uptime_adjusts_initial_jiffies() {
        let fixture = sys::sys_fixture(Arch::X86_64).unwrap();
        let jiffies = fixture.symbol("jiffies_64").unwrap();
        let inspector = inspector(fixture, Config::for_test());

        let uptime = inspector.uptime(jiffies).unwrap();
        assert_eq!(corewalk_sys::format_uptime(uptime), "0:02:34");
    }

    #[test]
    fn test_uptime_unadjusted() {
        let fixture = sys::sys_fixture(Arch::X86_64).unwrap();
        let config = Config {
            kernel: KernelSettings {
                hz: sys::FIXTURE_HZ,
                adjust_initial_jiffies: false,
            },
            ..Config::default()
        };
        let inspector = inspector(fixture, config);

        let clock = inspector.tick_clock().unwrap();
        assert_eq!(clock.initial_offset(), 0);
        assert_eq!(corewalk_sys::format_uptime(clock.uptime(27_028_508)), "1 day, 6:01:54");
    }

    #[test]
    fn test_utsname_loadavg_and_config() {
        let fixture = sys::sys_fixture(Arch::X86_64).unwrap();
        let uts = fixture.symbol("init_uts_ns").unwrap();
        let avenrun = fixture.symbol("avenrun").unwrap();
        let ikconfig = fixture.symbol("kernel_config_data").unwrap();
        let blob_len = sys::ikconfig_blob(sys::KERNEL_CONFIG).unwrap().len();
        let inspector = inspector(fixture, Config::for_test());

        let snapshot = inspector.utsname(uts).unwrap();
        assert!(snapshot.is_complete());
        assert_eq!(snapshot.sysname().text(), Some(sys::UTSNAME[0]));

        let loads = inspector.loadavg(avenrun).unwrap();
        assert_eq!(loads, [0.17, 0.05, 0.01]);

        let config = inspector.kernel_config(ikconfig, blob_len).unwrap();
        assert_eq!(config.hz().unwrap(), sys::FIXTURE_HZ);
    }
}
