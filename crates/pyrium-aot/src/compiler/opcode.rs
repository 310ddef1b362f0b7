//! The instruction set.
//!
//! Opcodes are partitioned into reserved numeric bands, one per domain.
//! New opcodes are appended inside their band and existing ids never move,
//! since runtimes match on the raw wire value.

use std::fmt;
use std::ops::RangeInclusive;

/// Declares the opcode enum together with its wire-id lookup, canonical
/// names and band membership from a single table.
macro_rules! opcodes {
    (
        $(
            $band:ident {
                $( $variant:ident = $id:literal => $name:literal, )*
            }
        )*
    ) => {
        /// Operation codes understood by the mod runtime.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u32)]
        pub enum Opcode {
            $( $( #[doc = $name] $variant = $id, )* )*
        }

        impl Opcode {
            /// Every opcode, in ascending id order.
            pub const ALL: &'static [Opcode] = &[ $( $( Opcode::$variant, )* )* ];

            /// Looks up an opcode by its wire id.
            pub fn from_u32(id: u32) -> Option<Self> {
                match id {
                    $( $( $id => Some(Opcode::$variant), )* )*
                    _ => None,
                }
            }

            /// Returns the canonical upper-case name.
            pub fn name(self) -> &'static str {
                match self {
                    $( $( Opcode::$variant => $name, )* )*
                }
            }

            /// Returns the band this opcode belongs to.
            pub fn band(self) -> Band {
                match self {
                    $( $( Opcode::$variant => Band::$band, )* )*
                }
            }
        }
    };
}

opcodes! {
    Control {
        Nop = 0 => "NOP",
        Log = 1 => "LOG",
        Debug = 2 => "DEBUG",
        Assert = 3 => "ASSERT",
        IfBegin = 10 => "IF_BEGIN",
        IfElse = 11 => "IF_ELSE",
        IfEnd = 12 => "IF_END",
        WhileBegin = 13 => "WHILE_BEGIN",
        WhileCheck = 14 => "WHILE_CHECK",
        WhileEnd = 15 => "WHILE_END",
        ForInit = 16 => "FOR_INIT",
        ForIter = 17 => "FOR_ITER",
        ForEnd = 18 => "FOR_END",
        Break = 19 => "BREAK",
        Continue = 20 => "CONTINUE",
        TryBegin = 21 => "TRY_BEGIN",
        Catch = 22 => "CATCH",
        TryEnd = 23 => "TRY_END",
        Return = 24 => "RETURN",
        CallFunc = 25 => "CALL_FUNC",
        CallApi = 26 => "CALL_API",
    }
    World {
        SetTime = 50 => "SET_TIME",
        GetTime = 51 => "GET_TIME",
        SetWeather = 52 => "SET_WEATHER",
        GetWeather = 53 => "GET_WEATHER",
        SetGamerule = 54 => "SET_GAMERULE",
        Teleport = 55 => "TELEPORT",
        ChangeDimension = 56 => "CHANGE_DIMENSION",
        Raycast = 57 => "RAYCAST",
        PathfindTo = 58 => "PATHFIND_TO",
        SetDifficulty = 59 => "SET_DIFFICULTY",
    }
    Entities {
        SpawnEntity = 80 => "SPAWN_ENTITY",
        RemoveEntity = 81 => "REMOVE_ENTITY",
        FindEntities = 82 => "FIND_ENTITIES",
        FindEntitiesRegion = 83 => "FIND_ENTITIES_REGION",
        SetEntityNbt = 84 => "SET_ENTITY_NBT",
        GetEntityNbt = 85 => "GET_ENTITY_NBT",
        SetEntityAttr = 86 => "SET_ENTITY_ATTR",
        GetEntityAttr = 87 => "GET_ENTITY_ATTR",
        AddEffect = 88 => "ADD_EFFECT",
        ClearEffect = 89 => "CLEAR_EFFECT",
        SetEntityFlag = 90 => "SET_ENTITY_FLAG",
        PlayEntityAnimation = 91 => "PLAY_ENTITY_ANIMATION",
        EquipItem = 92 => "EQUIP_ITEM",
        DropItem = 93 => "DROP_ITEM",
        Mount = 94 => "MOUNT",
        Dismount = 95 => "DISMOUNT",
        SetEntityRotation = 96 => "SET_ENTITY_ROTATION",
        SetEntityPosition = 97 => "SET_ENTITY_POSITION",
        DamageEntity = 98 => "DAMAGE_ENTITY",
        HealEntity = 99 => "HEAL_ENTITY",
        SetEntityName = 100 => "SET_ENTITY_NAME",
        SetEntityTag = 101 => "SET_ENTITY_TAG",
        ClearEntityTag = 102 => "CLEAR_ENTITY_TAG",
        MulEntitySpeed = 103 => "MUL_ENTITY_SPEED",
    }
    Players {
        Broadcast = 120 => "BROADCAST",
        MessagePlayer = 121 => "MESSAGE_PLAYER",
        TitlePlayer = 122 => "TITLE_PLAYER",
        ActionbarPlayer = 123 => "ACTIONBAR_PLAYER",
        GiveItem = 124 => "GIVE_ITEM",
        TakeItem = 125 => "TAKE_ITEM",
        OpenGui = 126 => "OPEN_GUI",
        CloseGui = 127 => "CLOSE_GUI",
        SetPermissions = 128 => "SET_PERMISSIONS",
        ExecCmd = 129 => "EXEC_CMD",
        TeleportPlayer = 130 => "TELEPORT_PLAYER",
        SetFood = 131 => "SET_FOOD",
        SetXp = 132 => "SET_XP",
        AddXp = 133 => "ADD_XP",
        SetGamemode = 134 => "SET_GAMEMODE",
        PlaySound = 135 => "PLAY_SOUND",
        ShowParticles = 136 => "SHOW_PARTICLES",
        SetPlayerNbt = 137 => "SET_PLAYER_NBT",
        GetPlayerNbt = 138 => "GET_PLAYER_NBT",
        SetScore = 139 => "SET_SCORE",
        GetScore = 140 => "GET_SCORE",
        AdvancementGrant = 141 => "ADVANCEMENT_GRANT",
        AdvancementRevoke = 142 => "ADVANCEMENT_REVOKE",
    }
    Items {
        CreateItemstack = 160 => "CREATE_ITEMSTACK",
        SetItemNbt = 161 => "SET_ITEM_NBT",
        GetItemNbt = 162 => "GET_ITEM_NBT",
        EnchantItem = 163 => "ENCHANT_ITEM",
        SetItemName = 164 => "SET_ITEM_NAME",
        SetItemLore = 165 => "SET_ITEM_LORE",
        AddItemAttribute = 166 => "ADD_ITEM_ATTRIBUTE",
        ClearItemEnchants = 167 => "CLEAR_ITEM_ENCHANTS",
        RegisterRecipe = 168 => "REGISTER_RECIPE",
        UnregisterRecipe = 169 => "UNREGISTER_RECIPE",
        CraftItem = 170 => "CRAFT_ITEM",
    }
    Blocks {
        SetBlock = 200 => "SET_BLOCK",
        GetBlock = 201 => "GET_BLOCK",
        SetBlockNbt = 202 => "SET_BLOCK_NBT",
        GetBlockNbt = 203 => "GET_BLOCK_NBT",
        FillRegion = 204 => "FILL_REGION",
        ReplaceRegion = 205 => "REPLACE_REGION",
        PasteSchematic = 206 => "PASTE_SCHEMATIC",
        SaveStructure = 207 => "SAVE_STRUCTURE",
        LoadStructure = 208 => "LOAD_STRUCTURE",
        UpdateBlock = 209 => "UPDATE_BLOCK",
        PowerBlock = 210 => "POWER_BLOCK",
        TickBlock = 211 => "TICK_BLOCK",
        SetBiome = 212 => "SET_BIOME",
        GetBiome = 213 => "GET_BIOME",
        PlaceFluid = 214 => "PLACE_FLUID",
        RemoveFluid = 215 => "REMOVE_FLUID",
    }
    Scoreboard {
        ScoreboardCreate = 240 => "SCOREBOARD_CREATE",
        ScoreboardRemove = 241 => "SCOREBOARD_REMOVE",
        ScoreboardSetDisplay = 242 => "SCOREBOARD_SET_DISPLAY",
        TagAdd = 243 => "TAG_ADD",
        TagRemove = 244 => "TAG_REMOVE",
        TagHas = 245 => "TAG_HAS",
        DataStoreSet = 246 => "DATA_STORE_SET",
        DataStoreGet = 247 => "DATA_STORE_GET",
        DataStoreDelete = 248 => "DATA_STORE_DELETE",
    }
    Loot {
        LootTableRoll = 270 => "LOOT_TABLE_ROLL",
        LootDropAt = 271 => "LOOT_DROP_AT",
        AdvancementRegister = 272 => "ADVANCEMENT_REGISTER",
        AdvancementUnregister = 273 => "ADVANCEMENT_UNREGISTER",
        RecipeRegister = 274 => "RECIPE_REGISTER",
        RecipeUnregister = 275 => "RECIPE_UNREGISTER",
    }
    Networking {
        SendPacket = 300 => "SEND_PACKET",
        ListenPacket = 301 => "LISTEN_PACKET",
        HttpGet = 302 => "HTTP_GET",
        HttpPost = 303 => "HTTP_POST",
        FileRead = 304 => "FILE_READ",
        FileWrite = 305 => "FILE_WRITE",
    }
    Events {
        OnTick = 330 => "ON_TICK",
        OnEntitySpawn = 331 => "ON_ENTITY_SPAWN",
        OnEntityDeath = 332 => "ON_ENTITY_DEATH",
        OnPlayerJoin = 333 => "ON_PLAYER_JOIN",
        OnPlayerQuit = 334 => "ON_PLAYER_QUIT",
        OnChat = 335 => "ON_CHAT",
        OnCommand = 336 => "ON_COMMAND",
        OnBlockPlace = 337 => "ON_BLOCK_PLACE",
        OnBlockBreak = 338 => "ON_BLOCK_BREAK",
        OnInteract = 339 => "ON_INTERACT",
        OnCraft = 340 => "ON_CRAFT",
    }
    Math {
        VarSet = 360 => "VAR_SET",
        VarGet = 361 => "VAR_GET",
        VarInc = 362 => "VAR_INC",
        VarDec = 363 => "VAR_DEC",
        MathAdd = 364 => "MATH_ADD",
        MathSub = 365 => "MATH_SUB",
        MathMul = 366 => "MATH_MUL",
        MathDiv = 367 => "MATH_DIV",
        CompEq = 368 => "COMP_EQ",
        CompNe = 369 => "COMP_NE",
        CompLt = 370 => "COMP_LT",
        CompLe = 371 => "COMP_LE",
        CompGt = 372 => "COMP_GT",
        CompGe = 373 => "COMP_GE",
        RandInt = 374 => "RAND_INT",
        RandFloat = 375 => "RAND_FLOAT",
    }
    Visuals {
        ParticleSpawn = 400 => "PARTICLE_SPAWN",
        SoundPlay = 401 => "SOUND_PLAY",
        BossbarCreate = 402 => "BOSSBAR_CREATE",
        BossbarUpdate = 403 => "BOSSBAR_UPDATE",
        BossbarRemove = 404 => "BOSSBAR_REMOVE",
    }
    Attributes {
        AttrSet = 430 => "ATTR_SET",
        AttrGet = 431 => "ATTR_GET",
        EffectAdd = 432 => "EFFECT_ADD",
        EffectRemove = 433 => "EFFECT_REMOVE",
    }
    Registries {
        TagRegister = 460 => "TAG_REGISTER",
        TagUnregister = 461 => "TAG_UNREGISTER",
        RegistryLookup = 462 => "REGISTRY_LOOKUP",
    }
    Misc {
        Sleep = 490 => "SLEEP",
        Yield = 491 => "YIELD",
    }
    CustomMobs {
        RegisterCustomMob = 600 => "REGISTER_CUSTOM_MOB",
        SetCustomMobModel = 601 => "SET_CUSTOM_MOB_MODEL",
        SetCustomMobTexture = 602 => "SET_CUSTOM_MOB_TEXTURE",
        SetCustomMobSize = 603 => "SET_CUSTOM_MOB_SIZE",
        SetCustomMobAttr = 610 => "SET_CUSTOM_MOB_ATTR",
        SetCustomMobLootTable = 611 => "SET_CUSTOM_MOB_LOOT_TABLE",
        SetCustomMobEquip = 612 => "SET_CUSTOM_MOB_EQUIP",
        SetCustomMobAi = 613 => "SET_CUSTOM_MOB_AI",
        SpawnCustomMob = 620 => "SPAWN_CUSTOM_MOB",
        RemoveCustomMobs = 621 => "REMOVE_CUSTOM_MOBS",
    }
}

impl Opcode {
    /// Returns the wire id.
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Returns which operand fields this opcode reads, for the opcodes the
    /// lowering pass emits. Reserved opcodes have no fixed schema yet.
    pub fn schema(self) -> Option<OperandSchema> {
        use Opcode::*;

        let schema = match self {
            Log | Broadcast | ExecCmd | RemoveCustomMobs | IfBegin | WhileBegin | WhileCheck
            | ForEnd => OperandSchema::A,
            IfElse | IfEnd | WhileEnd => OperandSchema::NONE,
            ForInit | SetBlock | SpawnCustomMob => OperandSchema::A_I,
            ForIter => OperandSchema {
                a: true,
                b: false,
                d: true,
                i: true,
            },
            MulEntitySpeed | SetCustomMobSize => OperandSchema::A_D,
            GiveItem => OperandSchema {
                a: true,
                b: true,
                d: false,
                i: true,
            },
            RegisterCustomMob | SetCustomMobModel | SetCustomMobTexture | SetCustomMobLootTable
            | SetCustomMobEquip | SetCustomMobAi => OperandSchema::A_B,
            SetCustomMobAttr => OperandSchema {
                a: true,
                b: true,
                d: true,
                i: false,
            },
            _ => return None,
        };
        Some(schema)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u32> for Opcode {
    type Error = u32;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Opcode::from_u32(id).ok_or(id)
    }
}

/// A reserved id range grouping opcodes of one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    /// Core and control flow
    Control,
    /// World, time, weather, dimension
    World,
    /// Entities
    Entities,
    /// Players
    Players,
    /// Inventory and items
    Items,
    /// Blocks and world edits
    Blocks,
    /// Scoreboard, tags, data storage
    Scoreboard,
    /// Loot, recipes, advancements
    Loot,
    /// Networking and IO
    Networking,
    /// Event hook registration
    Events,
    /// Math and variables
    Math,
    /// Particles, sounds, visuals
    Visuals,
    /// Attributes and effects
    Attributes,
    /// Tags and registries
    Registries,
    /// Miscellaneous
    Misc,
    /// Custom entity extension band
    CustomMobs,
}

impl Band {
    /// Returns the reserved id range of this band.
    pub fn range(self) -> RangeInclusive<u32> {
        match self {
            Band::Control => 0..=49,
            Band::World => 50..=79,
            Band::Entities => 80..=119,
            Band::Players => 120..=159,
            Band::Items => 160..=199,
            Band::Blocks => 200..=239,
            Band::Scoreboard => 240..=269,
            Band::Loot => 270..=299,
            Band::Networking => 300..=329,
            Band::Events => 330..=359,
            Band::Math => 360..=399,
            Band::Visuals => 400..=429,
            Band::Attributes => 430..=459,
            Band::Registries => 460..=489,
            Band::Misc => 490..=499,
            Band::CustomMobs => 600..=699,
        }
    }
}

/// Which of an instruction's operand fields carry meaning.
///
/// Fields outside the schema stay at their defaults (empty string, `0.0`,
/// `0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandSchema {
    /// Primary string operand
    pub a: bool,
    /// Secondary string operand
    pub b: bool,
    /// Float operand
    pub d: bool,
    /// Integer operand
    pub i: bool,
}

impl OperandSchema {
    /// No operands.
    pub const NONE: Self = Self {
        a: false,
        b: false,
        d: false,
        i: false,
    };
    /// `a` only.
    pub const A: Self = Self {
        a: true,
        ..Self::NONE
    };
    /// `a` and `b`.
    pub const A_B: Self = Self {
        a: true,
        b: true,
        ..Self::NONE
    };
    /// `a` and `d`.
    pub const A_D: Self = Self {
        a: true,
        d: true,
        ..Self::NONE
    };
    /// `a` and `i`.
    pub const A_I: Self = Self {
        a: true,
        i: true,
        ..Self::NONE
    };
}
