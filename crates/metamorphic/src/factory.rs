//! The metamorphic factory: deploys, kills and redeploys contracts at CREATE2 addresses that only
//! depend on the salt.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use delegate::delegate;
use metamorphic_contracts::{
    erc20,
    factory::{self, IMetamorphicFactory::IMetamorphicFactoryCalls},
    metamorphic_init,
    selfdestruct::ISelfDestructible,
};
use tracing::info;

use crate::{
    decode_calldata,
    detect::{self, ContractAnalysis},
    AddressDeriver, ArtifactRegistry, BlockEnv, DeploymentSlot, Erc20Ledger, ExternalLedger,
    FactoryConfig, MetamorphicError, Result, Salt, StateTrace, World,
};

/// Owner of the world and of every metamorphic slot in it.
///
/// Each public operation is atomic: on error the world is left exactly as it was before the call.
#[derive(Clone, Debug)]
pub struct MetamorphicFactory {
    config: FactoryConfig,
    deriver: AddressDeriver,
    artifacts: ArtifactRegistry,
    world: World,
}

impl Default for MetamorphicFactory {
    fn default() -> Self {
        Self::new(FactoryConfig::default())
    }
}

impl MetamorphicFactory {
    /// Creates a world at the configured genesis with the factory deployed in it, installing the
    /// built-in staking artifacts.
    pub fn new(config: FactoryConfig) -> Self {
        let artifacts = ArtifactRegistry::with_builtins(&config.staking);
        Self::with_artifacts(config, artifacts)
    }

    /// Like [`MetamorphicFactory::new`], with a custom artifact registry.
    pub fn with_artifacts(config: FactoryConfig, artifacts: ArtifactRegistry) -> Self {
        let mut world = World::new(config.genesis);
        world.create_account(
            config.factory_deployer,
            config.factory_address,
            factory::CODE,
            factory::CODE,
            None,
        );
        info!(factory = %config.factory_address, deployer = %config.factory_deployer, "Deployed factory");
        Self { deriver: AddressDeriver::new(config.factory_address), config, artifacts, world }
    }

    delegate! {
        to self.world {
            /// Returns the slot of `salt`.
            pub fn lookup(&self, salt: &Salt) -> Option<DeploymentSlot>;
            /// Returns the slot bound to `address`.
            pub fn lookup_by_address(&self, address: &Address) -> Option<DeploymentSlot>;
            /// The block the next operation executes in.
            pub fn block(&self) -> BlockEnv;
            /// Moves the clock forward by `secs` without producing a block.
            pub fn advance_time(&mut self, secs: u64);
            /// The native balance of `address`.
            pub fn native_balance(&self, address: &Address) -> U256;
            /// Credits `amount` of native currency to `address`.
            pub fn fund(&mut self, address: Address, amount: U256) -> Result<()>;
            /// Every recorded state transition, oldest first.
            pub fn traces(&self) -> &[StateTrace];
        }
    }

    /// The configuration the factory was created with.
    pub const fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// The factory address.
    pub const fn address(&self) -> Address {
        self.deriver.factory()
    }

    /// The known runtime artifacts.
    pub const fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    /// The world the factory lives in.
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Advances the world by one block of the configured block time.
    pub fn mine(&mut self) -> BlockEnv {
        self.world.mine(self.config.block_time)
    }

    /// Computes the address of the slot keyed by `salt`.
    ///
    /// The result is the same before deployment, while alive, after a kill and after a
    /// redeployment with different code.
    pub fn get_metamorphic_contract_address(&self, salt: Salt) -> Address {
        self.deriver.derive(salt)
    }

    /// Deploys `runtime_code` at the slot of `salt` and runs `init_calldata` against it.
    ///
    /// The initializer is called with the factory as `msg.sender` and `origin` as `tx.origin`.
    /// Fails with [`MetamorphicError::SlotOccupied`] if the slot is alive.
    pub fn deploy(
        &mut self,
        origin: Address,
        salt: Salt,
        runtime_code: Bytes,
        init_calldata: Bytes,
    ) -> Result<Address> {
        let Self { deriver, artifacts, world, .. } = self;
        world.transact(|world| {
            deploy_slot(world, deriver, artifacts, origin, salt, runtime_code, &init_calldata)
        })
    }

    /// Same as [`MetamorphicFactory::deploy`], named after the factory's ABI.
    pub fn deploy_metamorphic_contract(
        &mut self,
        origin: Address,
        salt: Salt,
        implementation_code: Bytes,
        initialization_calldata: Bytes,
    ) -> Result<Address> {
        self.deploy(origin, salt, implementation_code, initialization_calldata)
    }

    /// Redeploys a killed slot with new runtime code.
    ///
    /// Fails with [`MetamorphicError::UnregisteredSlot`] if the salt was never deployed and with
    /// [`MetamorphicError::SlotOccupied`] if the slot is still alive.
    pub fn redeploy(
        &mut self,
        origin: Address,
        salt: Salt,
        runtime_code: Bytes,
        init_calldata: Bytes,
    ) -> Result<Address> {
        let Self { deriver, artifacts, world, .. } = self;
        world.transact(|world| {
            let slot = world.lookup(&salt).ok_or(MetamorphicError::UnregisteredSlot { salt })?;
            if slot.is_alive {
                return Err(MetamorphicError::SlotOccupied { salt, address: slot.address });
            }
            let derived = deriver.derive(salt);
            if derived != slot.address {
                return Err(MetamorphicError::AddressMismatch {
                    expected: slot.address,
                    actual: derived,
                });
            }
            deploy_slot(world, deriver, artifacts, origin, salt, runtime_code, &init_calldata)
        })
    }

    /// Sends `kill()` from `caller` to the contract at `address`.
    ///
    /// The contract decides whether the caller may kill it. On success its native balance goes to
    /// the beneficiary it chose and the slot is dead. Ledger balances of `address` are untouched.
    ///
    /// Fails with [`MetamorphicError::NotDestroyed`] if `kill()` returns without destroying the
    /// contract.
    pub fn kill(&mut self, caller: Address, address: Address) -> Result<()> {
        self.world.transact(|world| {
            match world.lookup_by_address(&address) {
                Some(slot) if slot.is_alive => {}
                _ => return Err(MetamorphicError::NotAlive { address }),
            }
            world.call(caller, caller, address, &ISelfDestructible::killCall {}.abi_encode())?;
            if world.lookup_by_address(&address).is_some_and(|slot| slot.is_alive) {
                return Err(MetamorphicError::NotDestroyed { address });
            }
            Ok(())
        })
    }

    /// Sends ABI-encoded `input` from the externally owned `caller` to `to`.
    ///
    /// Calls to the factory address are served by the factory's own `IMetamorphicFactory`
    /// interface, with `caller` as the deployment origin.
    pub fn call(&mut self, caller: Address, to: Address, input: &[u8]) -> Result<Bytes> {
        let Self { deriver, artifacts, world, .. } = self;
        world.transact(|world| {
            if to == deriver.factory() {
                return dispatch_factory(world, deriver, artifacts, caller, input);
            }
            world.call(caller, caller, to, input)
        })
    }

    /// Sends `call` from the externally owned `caller` to `to` and decodes the return value.
    pub fn call_typed<C: SolCall>(
        &mut self,
        caller: Address,
        to: Address,
        call: &C,
    ) -> Result<C::Return> {
        let output = self.call(caller, to, &call.abi_encode())?;
        Ok(C::abi_decode_returns(&output)?)
    }

    /// Deploys a token ledger from `deployer` at its next CREATE address.
    pub fn deploy_token(
        &mut self,
        deployer: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Result<Address> {
        let ledger = Erc20Ledger::new(name, symbol);
        self.world.transact(|world| {
            let address = deployer.create(world.nonce(&deployer));
            world.create_account(deployer, address, erc20::CODE, erc20::CODE, None);
            info!(%deployer, token = %address, symbol = %ledger.symbol(), "Deployed token");
            world.insert_ledger(address, ledger);
            Ok(address)
        })
    }

    /// The ledger of the token deployed at `token`.
    pub fn ledger(&self, token: Address) -> Result<&Erc20Ledger> {
        self.world.ledger(&token).ok_or(MetamorphicError::UnknownToken(token))
    }

    /// Mints `amount` of `token` to `to`.
    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<()> {
        let ledger =
            self.world.ledger_mut(&token).ok_or(MetamorphicError::UnknownToken(token))?;
        Ok(ledger.mint(to, amount)?)
    }

    /// The `token` balance of `owner`.
    pub fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        Ok(self.ledger(token)?.balance_of(owner))
    }

    /// Runs the metamorphic detector on `address`.
    pub fn analyze_contract(&self, address: Address) -> ContractAnalysis {
        detect::analyze_contract(&self.world, address)
    }
}

fn dispatch_factory(
    world: &mut World,
    deriver: &AddressDeriver,
    artifacts: &ArtifactRegistry,
    caller: Address,
    input: &[u8],
) -> Result<Bytes> {
    let output = match decode_calldata::<IMetamorphicFactoryCalls>(input)? {
        IMetamorphicFactoryCalls::getMetamorphicContractAddress(call) => {
            deriver.derive(call.salt).abi_encode()
        }
        IMetamorphicFactoryCalls::deployMetamorphicContract(call) => deploy_slot(
            world,
            deriver,
            artifacts,
            caller,
            call.salt,
            call.implementationCode,
            &call.initializationCalldata,
        )?
        .abi_encode(),
    };
    Ok(output.into())
}

/// Creates the slot of `salt` with `runtime_code` and runs the initializer.
fn deploy_slot(
    world: &mut World,
    deriver: &AddressDeriver,
    artifacts: &ArtifactRegistry,
    origin: Address,
    salt: Salt,
    runtime_code: Bytes,
    init_calldata: &[u8],
) -> Result<Address> {
    let address = deriver.derive(salt);
    if let Some(slot) = world.lookup(&salt) {
        if slot.is_alive {
            return Err(MetamorphicError::SlotOccupied { salt, address: slot.address });
        }
    }
    world.registry_mut().register(salt, address)?;

    let code_hash = world.create_account(
        deriver.factory(),
        address,
        metamorphic_init::CODE,
        runtime_code,
        Some(salt),
    );
    world.install(address, artifacts.instantiate(&code_hash));
    let timestamp = world.block().timestamp;
    let slot = world.registry_mut().activate(salt, code_hash, timestamp)?;
    info!(
        %salt,
        %address,
        %code_hash,
        incarnation = slot.incarnation,
        artifact = artifacts.name_of(&code_hash).unwrap_or("unknown"),
        "Deployed metamorphic contract"
    );

    if !init_calldata.is_empty() {
        world.call(origin, deriver.factory(), address, init_calldata)?;
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, B256};
    use metamorphic_contracts::{
        evil_staking, factory::IMetamorphicFactory, honest_staking,
        honest_staking::IHonestStaking,
    };

    use crate::{salt_from_u64, CallContext, ContractLogic, StakingConfig};

    const OWNER: Address = address!("0x000000000000000000000000000000000000a11c");

    #[test]
    fn test_factory_is_deployed_at_genesis() {
        let factory = MetamorphicFactory::default();
        assert_eq!(factory.address(), factory.config().factory_address);
        assert!(factory.world().has_code(&factory.address()));
        assert_eq!(factory.world().code(&factory.address()), Some(factory::CODE));
        assert_eq!(factory.block(), factory.config().genesis);
    }

    #[test]
    fn test_deploy_binds_slot_to_derived_address() {
        let mut factory = MetamorphicFactory::default();
        let salt = salt_from_u64(1);
        let predicted = factory.get_metamorphic_contract_address(salt);

        let address = factory.deploy(OWNER, salt, honest_staking::CODE, Bytes::new()).unwrap();
        assert_eq!(address, predicted);

        let slot = factory.lookup(&salt).unwrap();
        assert!(slot.is_alive);
        assert_eq!(slot.address, address);
        assert_eq!(slot.incarnation, 1);
        assert_eq!(slot.init_timestamp, factory.block().timestamp);
        assert_eq!(slot.code_hash, factory.world().code_hash(&address));
    }

    #[test]
    fn test_kill_requires_live_slot() {
        let mut factory = MetamorphicFactory::default();
        let address = factory.get_metamorphic_contract_address(salt_from_u64(3));
        assert!(matches!(
            factory.kill(OWNER, address),
            Err(MetamorphicError::NotAlive { address: a }) if a == address
        ));
    }

    #[test]
    fn test_redeploy_requires_prior_deployment() {
        let mut factory = MetamorphicFactory::default();
        let salt = salt_from_u64(4);
        assert!(matches!(
            factory.redeploy(OWNER, salt, evil_staking::CODE, Bytes::new()),
            Err(MetamorphicError::UnregisteredSlot { salt: s }) if s == salt
        ));
        assert!(factory.lookup(&salt).is_none());
    }

    #[test]
    fn test_deploy_token_uses_create_addresses() {
        let mut factory = MetamorphicFactory::default();
        let first = factory.deploy_token(OWNER, "First", "ONE").unwrap();
        let second = factory.deploy_token(OWNER, "Second", "TWO").unwrap();
        assert_eq!(first, OWNER.create(0));
        assert_eq!(second, OWNER.create(1));
        assert_eq!(factory.ledger(second).unwrap().symbol(), "TWO");
        assert!(matches!(
            factory.balance_of(OWNER, OWNER),
            Err(MetamorphicError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_deploy_metamorphic_contract_matches_deploy() {
        let mut factory = MetamorphicFactory::default();
        let salt = salt_from_u64(5);
        let address = factory
            .deploy_metamorphic_contract(OWNER, salt, honest_staking::CODE, Bytes::new())
            .unwrap();
        assert_eq!(address, factory.get_metamorphic_contract_address(salt));
        assert!(factory.lookup(&salt).unwrap().is_alive);
        assert!(matches!(
            factory.deploy_metamorphic_contract(OWNER, salt, evil_staking::CODE, Bytes::new()),
            Err(MetamorphicError::SlotOccupied { .. })
        ));
    }

    #[test]
    fn test_factory_abi_is_served() {
        let mut factory = MetamorphicFactory::default();
        let salt = salt_from_u64(6);
        let to = factory.address();

        let predicted = factory
            .call_typed(OWNER, to, &IMetamorphicFactory::getMetamorphicContractAddressCall { salt })
            .unwrap();
        assert_eq!(predicted, factory.get_metamorphic_contract_address(salt));

        let deploy = IMetamorphicFactory::deployMetamorphicContractCall {
            salt,
            implementationCode: honest_staking::CODE,
            initializationCalldata: Bytes::new(),
        };
        assert_eq!(factory.call_typed(OWNER, to, &deploy).unwrap(), predicted);
        assert_eq!(factory.lookup(&salt).unwrap().address, predicted);
        assert_eq!(factory.world().code(&predicted), Some(honest_staking::CODE));

        assert!(matches!(
            factory.call_typed(OWNER, to, &deploy),
            Err(MetamorphicError::SlotOccupied { .. })
        ));
        assert!(matches!(
            factory.call(OWNER, to, &IHonestStaking::totalSupplyCall {}.abi_encode()),
            Err(MetamorphicError::UnknownSelector(_))
        ));
    }

    /// Answers every call, `kill()` included, without ever destroying itself.
    #[derive(Clone, Debug)]
    struct Immortal;

    impl ContractLogic for Immortal {
        fn call(&mut self, _ctx: &mut CallContext<'_>, _input: &[u8]) -> Result<Bytes> {
            Ok(Bytes::new())
        }

        fn clone_box(&self) -> Box<dyn ContractLogic> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_kill_that_does_not_destroy_is_rejected() {
        let code = Bytes::from_static(&[0x5b, 0x00]);
        let mut artifacts = ArtifactRegistry::with_builtins(&StakingConfig::default());
        artifacts.register("Immortal", &code, || Box::new(Immortal));
        let mut factory = MetamorphicFactory::with_artifacts(FactoryConfig::default(), artifacts);
        let salt = salt_from_u64(8);
        let address = factory.deploy(OWNER, salt, code, Bytes::new()).unwrap();
        let traces = factory.traces().len();

        assert!(matches!(
            factory.kill(OWNER, address),
            Err(MetamorphicError::NotDestroyed { address: a }) if a == address
        ));
        assert!(factory.lookup(&salt).unwrap().is_alive);
        assert!(factory.world().is_installed(&address));
        assert_eq!(factory.traces().len(), traces);
    }

    #[test]
    fn test_redeploy_checks_address_before_deploying() {
        let mut factory = MetamorphicFactory::default();
        let salt = salt_from_u64(9);
        let address = factory.deploy(OWNER, salt, honest_staking::CODE, Bytes::new()).unwrap();
        factory.world.self_destruct(address, OWNER).unwrap();
        let traces = factory.traces().len();

        factory.deriver = AddressDeriver::with_init_code_hash(factory.address(), B256::ZERO);
        let err = factory.redeploy(OWNER, salt, evil_staking::CODE, Bytes::new()).unwrap_err();
        assert!(matches!(
            err,
            MetamorphicError::AddressMismatch { expected, actual }
                if expected == address && actual != address
        ));
        assert!(!factory.lookup(&salt).unwrap().is_alive);
        assert_eq!(factory.traces().len(), traces);
    }
}
